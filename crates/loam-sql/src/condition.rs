use loam_core::driver::Dialect;
use loam_core::stmt::Value;
use loam_core::{Error, Result};

/// Comparison operators for structured clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    Between,
}

impl Op {
    fn token(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Like => "LIKE",
            Op::In => "IN",
            Op::Between => "BETWEEN",
        }
    }
}

/// A condition tree. Rendering parenthesizes nested `All` / `Any` groups
/// so operator precedence never changes the meaning, at any depth.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Verbatim SQL fragment.
    Raw(String),

    /// A fragment with placeholders: each argument binds exactly one
    /// placeholder, left to right. `?` renders one quoted scalar (a list
    /// renders parenthesized); `?*` expands a list to a bare
    /// comma-separated run of literals.
    Template(String, Vec<Value>),

    /// One structured comparison.
    Clause {
        table: Option<String>,
        column: String,
        op: Op,
        value: Value,
    },

    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    pub fn template(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Template(sql.into(), args)
    }

    pub fn clause(column: &str, op: Op, value: impl Into<Value>) -> Self {
        Self::Clause {
            table: None,
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn qualified(table: &str, column: &str, op: Op, value: impl Into<Value>) -> Self {
        Self::Clause {
            table: Some(table.to_string()),
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    /// Conjoin, flattening an existing `All` on the left.
    pub fn and(self, other: Condition) -> Condition {
        match self {
            Condition::All(mut items) => {
                items.push(other);
                Condition::All(items)
            }
            first => Condition::All(vec![first, other]),
        }
    }

    /// Disjoin, flattening an existing `Any` on the left.
    pub fn or(self, other: Condition) -> Condition {
        match self {
            Condition::Any(mut items) => {
                items.push(other);
                Condition::Any(items)
            }
            first => Condition::Any(vec![first, other]),
        }
    }

    pub fn render(&self, dialect: Dialect) -> Result<String> {
        match self {
            Condition::Raw(sql) => Ok(sql.clone()),
            Condition::Template(sql, args) => expand_template(sql, args, dialect),
            Condition::Clause {
                table,
                column,
                op,
                value,
            } => {
                let lhs = match table {
                    Some(table) => format!("{table}.{column}"),
                    None => column.clone(),
                };
                Ok(match (op, value) {
                    // NULL never compares equal; use the IS forms.
                    (Op::Eq, Value::Null) => format!("{lhs} IS NULL"),
                    (Op::Ne, Value::Null) => format!("{lhs} IS NOT NULL"),
                    (Op::In, Value::List(items)) => {
                        format!("{lhs} IN ({})", dialect.quote_list(items))
                    }
                    (Op::In, single) => format!("{lhs} IN ({})", dialect.quote(single)),
                    (Op::Between, Value::List(items)) if items.len() == 2 => format!(
                        "{lhs} BETWEEN {} AND {}",
                        dialect.quote(&items[0]),
                        dialect.quote(&items[1])
                    ),
                    (Op::Between, other) => {
                        return Err(Error::configuration(format!(
                            "BETWEEN on `{lhs}` needs a two-element list, got {other:?}"
                        )))
                    }
                    (op, value) => format!("{lhs} {} {}", op.token(), dialect.quote(value)),
                })
            }
            Condition::All(items) => render_group(items, " AND ", "1=1", dialect),
            Condition::Any(items) => render_group(items, " OR ", "1=0", dialect),
        }
    }
}

fn render_group(
    items: &[Condition],
    joiner: &str,
    empty: &str,
    dialect: Dialect,
) -> Result<String> {
    match items {
        [] => Ok(empty.to_string()),
        [single] => single.render(dialect),
        items => {
            let parts = items
                .iter()
                .map(|item| {
                    let rendered = item.render(dialect)?;
                    Ok(match item {
                        Condition::All(inner) | Condition::Any(inner) if inner.len() > 1 => {
                            format!("({rendered})")
                        }
                        _ => rendered,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(parts.join(joiner))
        }
    }
}

/// Substitute template arguments into `sql`, left to right. Placeholder
/// and argument counts must agree.
fn expand_template(sql: &str, args: &[Value], dialect: Dialect) -> Result<String> {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    let mut args = args.iter();

    while let Some(pos) = rest.find('?') {
        out.push_str(&rest[..pos]);
        let arg = args.next().ok_or_else(|| {
            Error::configuration(format!("too few arguments for statement template `{sql}`"))
        })?;

        let list_expansion = rest[pos + 1..].starts_with('*');
        if list_expansion {
            match arg {
                Value::List(items) => out.push_str(&dialect.quote_list(items)),
                single => out.push_str(&dialect.quote(single)),
            }
            rest = &rest[pos + 2..];
        } else {
            match arg {
                Value::List(items) => {
                    out.push('(');
                    out.push_str(&dialect.quote_list(items));
                    out.push(')');
                }
                single => out.push_str(&dialect.quote(single)),
            }
            rest = &rest[pos + 1..];
        }
    }

    if args.next().is_some() {
        return Err(Error::configuration(format!(
            "too many arguments for statement template `{sql}`"
        )));
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const D: Dialect = Dialect::Sqlite;

    #[test]
    fn clause_rendering() {
        let c = Condition::clause("age", Op::Ge, 18);
        assert_eq!(c.render(D).unwrap(), "age >= 18");

        let c = Condition::qualified("loam_user", "name", Op::Like, "a%");
        assert_eq!(c.render(D).unwrap(), "loam_user.name LIKE 'a%'");

        let c = Condition::clause("hits", Op::In, vec![1i64, 2, 3]);
        assert_eq!(c.render(D).unwrap(), "hits IN (1,2,3)");

        let c = Condition::clause("age", Op::Between, vec![18i64, 65]);
        assert_eq!(c.render(D).unwrap(), "age BETWEEN 18 AND 65");
    }

    #[test]
    fn null_comparisons_use_is() {
        let c = Condition::clause("parent_id", Op::Eq, Value::Null);
        assert_eq!(c.render(D).unwrap(), "parent_id IS NULL");

        let c = Condition::clause("parent_id", Op::Ne, Value::Null);
        assert_eq!(c.render(D).unwrap(), "parent_id IS NOT NULL");
    }

    #[test]
    fn between_requires_a_pair() {
        let err = Condition::clause("age", Op::Between, 18)
            .render(D)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn template_binds_one_placeholder_per_argument() {
        let c = Condition::template("name = ? AND age > ?", vec!["o'brien".into(), 30i64.into()]);
        assert_eq!(c.render(D).unwrap(), "name = 'o''brien' AND age > 30");
    }

    #[test]
    fn template_list_expansion() {
        let ids: Value = vec![1i64, 2, 3].into();
        let c = Condition::template("id IN (?*)", vec![ids.clone()]);
        assert_eq!(c.render(D).unwrap(), "id IN (1,2,3)");

        // A scalar placeholder given a list renders it parenthesized.
        let c = Condition::template("id IN ?", vec![ids]);
        assert_eq!(c.render(D).unwrap(), "id IN (1,2,3)");
    }

    #[test]
    fn template_arity_mismatch_is_an_error() {
        let err = Condition::template("a = ? AND b = ?", vec![1i64.into()])
            .render(D)
            .unwrap_err();
        assert!(err.is_configuration());

        let err = Condition::template("a = ?", vec![1i64.into(), 2i64.into()])
            .render(D)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn nested_groups_parenthesize() {
        let c = Condition::clause("a", Op::Eq, 1).and(
            Condition::clause("b", Op::Eq, 2).or(Condition::clause("c", Op::Eq, 3)),
        );
        assert_eq!(c.render(D).unwrap(), "a = 1 AND (b = 2 OR c = 3)");

        let deep = Condition::Any(vec![
            Condition::All(vec![
                Condition::clause("a", Op::Eq, 1),
                Condition::Any(vec![
                    Condition::clause("b", Op::Eq, 2),
                    Condition::clause("c", Op::Eq, 3),
                ]),
            ]),
            Condition::clause("d", Op::Eq, 4),
        ]);
        assert_eq!(
            deep.render(D).unwrap(),
            "(a = 1 AND (b = 2 OR c = 3)) OR d = 4"
        );
    }

    #[test]
    fn singleton_and_empty_groups() {
        let c = Condition::All(vec![Condition::clause("a", Op::Eq, 1)]);
        assert_eq!(c.render(D).unwrap(), "a = 1");

        assert_eq!(Condition::All(vec![]).render(D).unwrap(), "1=1");
        assert_eq!(Condition::Any(vec![]).render(D).unwrap(), "1=0");
    }

    #[test]
    fn and_flattens() {
        let c = Condition::clause("a", Op::Eq, 1)
            .and(Condition::clause("b", Op::Eq, 2))
            .and(Condition::clause("c", Op::Eq, 3));
        assert_eq!(c.render(D).unwrap(), "a = 1 AND b = 2 AND c = 3");
    }
}
