//! Pure naming and column-SQL derivation: type names to table names, join
//! tables and their key columns, attribute annotations to column SQL.
//!
//! Everything here is deterministic in its inputs; declaration order never
//! influences a derived name.

use super::{Attribute, JoinTableInfo, Name};
use crate::driver::Dialect;

/// The physical table for a type name: prefix plus the flattened,
/// underscored full name.
pub fn tableize(prefix: &str, name: &Name) -> String {
    format!("{prefix}{}", name.snake_case())
}

/// The join table connecting two types. The participant names are put in
/// canonical (lexicographic) order first, so both sides derive the same
/// table regardless of which one declared the relation.
///
/// `postfix` disambiguates multiple distinct relations connecting the same
/// pair of types.
pub fn join_table_name(prefix: &str, a: &Name, b: &Name, postfix: &str) -> String {
    let (first, second) = canonical(a, b);
    format!(
        "{prefix}j_{}_{}{postfix}",
        first.snake_case(),
        second.snake_case()
    )
}

/// A key column inside a join table: demodulized underscored type name,
/// an optional disambiguation index, and the participant's primary-key
/// column.
pub fn join_table_key(name: &Name, index: &str, pk_column: &str) -> String {
    format!("{}{index}_{pk_column}", name.last_snake())
}

/// The (owner_key, target_key) pair for a join table. A self-join gets a
/// `2` index on the second key so the two columns stay distinct.
pub fn join_table_keys(
    owner: &Name,
    owner_pk: &str,
    target: &Name,
    target_pk: &str,
) -> (String, String) {
    if owner == target {
        (
            join_table_key(owner, "", owner_pk),
            join_table_key(target, "2", target_pk),
        )
    } else {
        (
            join_table_key(owner, "", owner_pk),
            join_table_key(target, "", target_pk),
        )
    }
}

/// All derived join-table facts for one relation. `table_override` wins
/// over the generated name; the result is fitted to the dialect's
/// identifier-length limit.
#[allow(clippy::too_many_arguments)]
pub fn join_table_info(
    prefix: &str,
    owner: &Name,
    owner_table: &str,
    owner_pk: &str,
    target: &Name,
    target_table: &str,
    target_pk: &str,
    postfix: &str,
    table_override: Option<&str>,
    dialect: Dialect,
) -> JoinTableInfo {
    let table = match table_override {
        Some(table) => table.to_string(),
        None => dialect.fit_identifier(join_table_name(prefix, owner, target, postfix)),
    };
    let (owner_key, target_key) = join_table_keys(owner, owner_pk, target, target_pk);
    let (first_key, second_key) = if canonical(owner, target).0 == owner {
        (owner_key.clone(), target_key.clone())
    } else {
        (target_key.clone(), owner_key.clone())
    };

    JoinTableInfo {
        table,
        owner_key,
        target_key,
        first_key,
        second_key,
        owner_table: owner_table.to_string(),
        target_table: target_table.to_string(),
    }
}

/// Column SQL for one attribute: quoted column name, type token and the
/// annotation-driven clauses. A raw `sql` annotation replaces everything
/// after the name; a `default` implies `NOT NULL`.
pub fn field_sql(attr: &Attribute, dialect: Dialect) -> String {
    let mut sql = dialect.quote_ident(attr.column_name());

    if let Some(raw) = &attr.sql {
        sql.push(' ');
        sql.push_str(raw);
        return sql;
    }

    if attr.primary_key && attr.auto_increment {
        sql.push(' ');
        sql.push_str(dialect.auto_primary_key());
        return sql;
    }

    sql.push(' ');
    match &attr.sql_type {
        Some(token) => sql.push_str(token),
        None => sql.push_str(dialect.type_token(attr.ty)),
    }

    if attr.primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    if attr.unique {
        sql.push_str(" UNIQUE");
    }
    if let Some(default) = &attr.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&dialect.quote(default));
    }
    if attr.not_null || attr.default.is_some() {
        sql.push_str(" NOT NULL");
    }
    if let Some(extra) = &attr.extra_sql {
        sql.push(' ');
        sql.push_str(extra);
    }

    sql
}

fn canonical<'a>(a: &'a Name, b: &'a Name) -> (&'a Name, &'a Name) {
    if a.full() <= b.full() {
        (a, b)
    } else {
        (b, a)
    }
}
