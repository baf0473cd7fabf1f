use crate::{Condition, Scope};

use loam_core::schema::{ModelId, RelationKind};
use loam_core::{Error, Result, Schema};

/// The structured option set a find (or aggregate) compiles from.
///
/// `sql` short-circuits everything else. `include` joins named relations
/// into the statement; `join_table`/`join_condition` splice in an ad-hoc
/// join; `extra` is appended verbatim at the end.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub condition: Option<Condition>,
    pub sql: Option<String>,
    pub include: Vec<String>,
    pub join_table: Option<String>,
    pub join_condition: Option<String>,
    pub select: Option<String>,
    pub group: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub extra: Option<String>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition; merged by AND with any condition already set.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Raw SQL tail or full statement; overrides every other option.
    pub fn sql(mut self, sql: &str) -> Self {
        self.sql = Some(sql.to_string());
        self
    }

    pub fn include(mut self, relation: &str) -> Self {
        self.include.push(relation.to_string());
        self
    }

    pub fn join_table(mut self, table: &str) -> Self {
        self.join_table = Some(table.to_string());
        self
    }

    pub fn join_condition(mut self, condition: &str) -> Self {
        self.join_condition = Some(condition.to_string());
        self
    }

    pub fn select(mut self, select: &str) -> Self {
        self.select = Some(select.to_string());
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn order(mut self, order: &str) -> Self {
        self.order = Some(order.to_string());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn extra(mut self, extra: &str) -> Self {
        self.extra = Some(extra.to_string());
        self
    }
}

struct Parts {
    select: String,
    from: Vec<String>,
    condition: Option<Condition>,
}

/// Resolve the option set against the schema: join tables for includes,
/// the inheritance discriminator, the scope merge.
fn assemble(
    schema: &Schema,
    model: ModelId,
    options: &FindOptions,
    scope: Option<&Scope>,
) -> Result<Parts> {
    let m = schema.model(model);
    let table = m.table.clone();

    let mut from = vec![table.clone()];
    let mut select_items = vec![];
    let mut condition: Option<Condition> = None;
    let push = |cond: Condition, condition: &mut Option<Condition>| {
        *condition = Some(match condition.take() {
            Some(existing) => existing.and(cond),
            None => cond,
        });
    };

    if let Some(cond) = &options.condition {
        push(cond.clone(), &mut condition);
    }
    if let Some(scope) = scope {
        if let Some(cond) = &scope.condition {
            push(cond.clone(), &mut condition);
        }
    }

    // Rows of an inheritance child live in the shared table; the
    // discriminator narrows them down. Roots read the whole tree.
    if m.is_sti_child() {
        push(
            Condition::qualified(&table, "model_type", crate::Op::Eq, m.name.full()),
            &mut condition,
        );
    }

    let pk = schema
        .primary_key(model)
        .map(|a| a.column_name().to_string())
        .unwrap_or_else(|| "id".to_string());

    for name in &options.include {
        let rel = schema.relation(model, name).ok_or_else(|| {
            Error::configuration(format!(
                "unknown relation `{name}` included in a query on `{}`",
                m.name.full()
            ))
        })?;
        let target = rel.target.expect_resolved();
        let tm = schema.model(target);
        let ttable = tm.table.clone();
        let tpk = schema
            .primary_key(target)
            .map(|a| a.column_name().to_string())
            .unwrap_or_else(|| "id".to_string());

        match rel.kind {
            RelationKind::RefersTo | RelationKind::BelongsTo => {
                let fk = rel.foreign_key();
                push(
                    Condition::raw(format!("{table}.{fk} = {ttable}.{tpk}")),
                    &mut condition,
                );
            }
            RelationKind::HasMany => {
                let fk = rel.foreign_key();
                push(
                    Condition::raw(format!("{ttable}.{fk} = {table}.{pk}")),
                    &mut condition,
                );
            }
            RelationKind::JoinsMany => {
                let join = rel.join.as_ref().ok_or_else(|| {
                    Error::configuration(format!(
                        "relation `{name}` on `{}` has no join table",
                        m.name.full()
                    ))
                })?;
                from.push(join.table.clone());
                push(
                    Condition::raw(format!(
                        "{}.{} = {table}.{pk}",
                        join.table, join.owner_key
                    )),
                    &mut condition,
                );
                push(
                    Condition::raw(format!(
                        "{}.{} = {ttable}.{tpk}",
                        join.table, join.target_key
                    )),
                    &mut condition,
                );
            }
        }

        if tm.is_sti_child() {
            push(
                Condition::qualified(&ttable, "model_type", crate::Op::Eq, tm.name.full()),
                &mut condition,
            );
        }

        from.push(ttable.clone());
        select_items.push(format!("{ttable}.*"));
    }

    if let Some(join_table) = &options.join_table {
        from.push(join_table.clone());
        if let Some(join_condition) = &options.join_condition {
            push(Condition::raw(join_condition.clone()), &mut condition);
        }
    }

    let select = match &options.select {
        Some(select) => select.clone(),
        None if select_items.is_empty() => format!("{table}.*"),
        None => {
            let mut items = vec![format!("{table}.*")];
            items.extend(select_items);
            items.join(", ")
        }
    };

    Ok(Parts {
        select,
        from,
        condition,
    })
}

/// Compile one SELECT statement for the option set.
pub fn compile_find(
    schema: &Schema,
    model: ModelId,
    options: &FindOptions,
    scope: Option<&Scope>,
) -> Result<String> {
    let table = &schema.model(model).table;

    // Raw SQL wins over everything else.
    if let Some(sql) = &options.sql {
        if sql.to_uppercase().contains("SELECT") {
            return Ok(sql.clone());
        }
        return Ok(format!("SELECT * FROM {table} {sql}"));
    }

    let parts = assemble(schema, model, options, scope)?;
    let mut stmt = format!("SELECT {} FROM {}", parts.select, parts.from.join(", "));

    if let Some(condition) = &parts.condition {
        stmt.push_str(" WHERE ");
        stmt.push_str(&condition.render(schema.dialect())?);
    }
    if let Some(group) = &options.group {
        stmt.push_str(" GROUP BY ");
        stmt.push_str(group);
    }
    let order = options
        .order
        .as_deref()
        .or_else(|| scope.and_then(|s| s.order.as_deref()));
    if let Some(order) = order {
        stmt.push_str(" ORDER BY ");
        stmt.push_str(order);
    }
    if let Some(limit) = options.limit {
        stmt.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = options.offset {
        stmt.push_str(&format!(" OFFSET {offset}"));
    }
    if let Some(extra) = &options.extra {
        stmt.push(' ');
        stmt.push_str(extra);
    }

    Ok(stmt)
}

/// Compile an aggregate over the same option pipeline. `term` is the
/// aggregate expression, e.g. `count(*)` or `avg(age)`; its function name
/// becomes the result column alias. Ordering only survives when grouping
/// makes it meaningful.
pub fn compile_aggregate(
    schema: &Schema,
    model: ModelId,
    term: &str,
    options: &FindOptions,
    scope: Option<&Scope>,
) -> Result<String> {
    let head = match term.find('(') {
        Some(pos) => &term[..pos],
        None => term,
    };

    let parts = assemble(schema, model, options, scope)?;
    let select = match &options.group {
        Some(group) => format!("{group}, {term} AS {head}"),
        None => format!("{term} AS {head}"),
    };

    let mut stmt = format!("SELECT {select} FROM {}", parts.from.join(", "));
    if let Some(condition) = &parts.condition {
        stmt.push_str(" WHERE ");
        stmt.push_str(&condition.render(schema.dialect())?);
    }
    if let Some(group) = &options.group {
        stmt.push_str(" GROUP BY ");
        stmt.push_str(group);
        if let Some(order) = &options.order {
            stmt.push_str(" ORDER BY ");
            stmt.push_str(order);
        }
    }

    Ok(stmt)
}
