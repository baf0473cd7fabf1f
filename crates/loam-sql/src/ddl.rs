//! Schema statement generation: CREATE TABLE / INDEX for models and join
//! tables, and the ALTER statements evolution applies.

use loam_core::driver::Dialect;
use loam_core::schema::{mapper, AttrType, Attribute, JoinTableInfo, ModelId};
use loam_core::Schema;

/// The CREATE TABLE statement for a model's physical table, covering the
/// whole inheritance tree that shares it.
pub fn create_table(schema: &Schema, model: ModelId) -> String {
    let dialect = schema.dialect();
    let columns = schema
        .table_attributes(model)
        .iter()
        .map(|attr| mapper::field_sql(attr, dialect))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({columns})", schema.model(model).table)
}

/// CREATE INDEX statements for the model's indexed attributes. Primary
/// keys and unique columns are indexed by the backend already.
pub fn create_indices(schema: &Schema, model: ModelId) -> Vec<String> {
    let table = &schema.model(model).table;
    schema
        .table_attributes(model)
        .iter()
        .filter(|attr| attr.index && !attr.primary_key && !attr.unique)
        .map(|attr| index_statement(schema.dialect(), table, attr.column_name()))
        .collect()
}

/// CREATE TABLE plus per-key indices for a join table.
pub fn create_join_table(dialect: Dialect, info: &JoinTableInfo) -> Vec<String> {
    let key_type = dialect.type_token(AttrType::BigInt);
    let create = format!(
        "CREATE TABLE {} ({} {key_type} NOT NULL, {} {key_type} NOT NULL)",
        info.table, info.first_key, info.second_key
    );
    vec![
        create,
        index_statement(dialect, &info.table, &info.first_key),
        index_statement(dialect, &info.table, &info.second_key),
    ]
}

pub fn add_column(dialect: Dialect, table: &str, attr: &Attribute) -> String {
    format!(
        "ALTER TABLE {table} ADD COLUMN {}",
        mapper::field_sql(attr, dialect)
    )
}

pub fn drop_column(dialect: Dialect, table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {table} DROP COLUMN {}",
        dialect.quote_ident(column)
    )
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE {table}")
}

fn index_statement(dialect: Dialect, table: &str, column: &str) -> String {
    let name = dialect.fit_identifier(format!("{table}_{column}_idx"));
    format!("CREATE INDEX {name} ON {table} ({column})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::schema::{ModelDef, Registry};
    use pretty_assertions::assert_eq;

    #[test]
    fn create_table_lists_every_column() {
        let mut registry = Registry::new();
        registry.define(
            ModelDef::new("User")
                .attr(Attribute::new("name", AttrType::Text))
                .attr(Attribute::new("age", AttrType::Int).default(18)),
        );
        let schema = registry.resolve(Dialect::Sqlite).unwrap();
        let user = schema.model_by_name("User").unwrap().id;

        assert_eq!(
            create_table(&schema, user),
            "CREATE TABLE loam_user (\"id\" integer PRIMARY KEY AUTOINCREMENT, \
             \"name\" text, \"age\" integer DEFAULT 18 NOT NULL)"
        );
    }

    #[test]
    fn indices_skip_keys_and_unique_columns() {
        let mut registry = Registry::new();
        registry.define(
            ModelDef::new("User")
                .attr(Attribute::new("email", AttrType::Text).unique().index())
                .attr(Attribute::new("age", AttrType::Int).index()),
        );
        let schema = registry.resolve(Dialect::Postgresql).unwrap();
        let user = schema.model_by_name("User").unwrap().id;

        assert_eq!(
            create_indices(&schema, user),
            vec!["CREATE INDEX loam_user_age_idx ON loam_user (age)".to_string()]
        );
    }

    #[test]
    fn join_table_statements() {
        let mut registry = Registry::new();
        registry.define(ModelDef::new("Article").joins_many("Category"));
        registry.define(ModelDef::new("Category"));
        let schema = registry.resolve(Dialect::Postgresql).unwrap();

        let article = schema.model_by_name("Article").unwrap();
        let info = article.relations[0].join.as_ref().unwrap();
        let stmts = create_join_table(Dialect::Postgresql, info);
        assert_eq!(
            stmts[0],
            "CREATE TABLE loam_j_article_category \
             (article_id bigint NOT NULL, category_id bigint NOT NULL)"
        );
        assert_eq!(
            stmts[1],
            "CREATE INDEX loam_j_article_category_article_id_idx \
             ON loam_j_article_category (article_id)"
        );
    }

    #[test]
    fn alter_statements() {
        let attr = Attribute::new("bio", AttrType::Text);
        assert_eq!(
            add_column(Dialect::Sqlite, "loam_user", &attr),
            "ALTER TABLE loam_user ADD COLUMN \"bio\" text"
        );
        assert_eq!(
            drop_column(Dialect::Mysql, "loam_user", "bio"),
            "ALTER TABLE loam_user DROP COLUMN `bio`"
        );
        assert_eq!(drop_table("loam_user"), "DROP TABLE loam_user");
    }
}
