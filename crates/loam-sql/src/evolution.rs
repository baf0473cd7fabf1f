//! Schema-evolution statement planning: declared attributes vs live
//! columns, turned into ALTER statements according to the active mode.

use crate::ddl;

use loam_core::schema::{EvolveMode, ModelId, SchemaDiff};
use loam_core::Schema;

/// What evolution decided for one table: the statements to run, in order
/// (additions strictly before removals), and the drift it left alone.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EvolutionPlan {
    pub statements: Vec<String>,
    pub warnings: Vec<String>,
}

impl EvolutionPlan {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.warnings.is_empty()
    }
}

/// Plan the evolution of one model's table given its live columns.
pub fn plan(schema: &Schema, model: ModelId, live: &[String], mode: EvolveMode) -> EvolutionPlan {
    if mode == EvolveMode::Off {
        return EvolutionPlan::default();
    }

    let attrs = schema.table_attributes(model);
    let declared: Vec<String> = attrs.iter().map(|a| a.column_name().to_string()).collect();
    let diff = SchemaDiff::from(&declared, live);

    let table = &schema.model(model).table;
    let dialect = schema.dialect();
    let mut plan = EvolutionPlan::default();

    for column in &diff.added {
        let attr = attrs
            .iter()
            .find(|a| a.column_name() == column)
            .expect("added column comes from the declared set");
        match mode {
            EvolveMode::AddOnly | EvolveMode::Full => {
                plan.statements.push(ddl::add_column(dialect, table, attr));
            }
            _ => plan.warnings.push(format!(
                "table `{table}` is missing declared column `{column}`"
            )),
        }
    }

    for column in &diff.removed {
        match mode {
            EvolveMode::Full => {
                plan.statements.push(ddl::drop_column(dialect, table, column));
            }
            _ => plan.warnings.push(format!(
                "table `{table}` carries undeclared column `{column}`"
            )),
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::driver::Dialect;
    use loam_core::schema::{AttrType, Attribute, ModelDef, Registry};
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        let mut registry = Registry::new();
        registry.define(
            ModelDef::new("User")
                .attr(Attribute::new("name", AttrType::Text))
                .attr(Attribute::new("email", AttrType::Text)),
        );
        registry.resolve(Dialect::Sqlite).unwrap()
    }

    fn live(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn additions_come_before_removals() {
        let schema = schema();
        let user = schema.model_by_name("User").unwrap().id;
        let plan = plan(
            &schema,
            user,
            &live(&["id", "name", "nickname"]),
            EvolveMode::Full,
        );

        assert_eq!(
            plan.statements,
            vec![
                "ALTER TABLE loam_user ADD COLUMN \"email\" text".to_string(),
                "ALTER TABLE loam_user DROP COLUMN \"nickname\"".to_string(),
            ]
        );
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn add_only_keeps_stray_columns() {
        let schema = schema();
        let user = schema.model_by_name("User").unwrap().id;
        let plan = plan(
            &schema,
            user,
            &live(&["id", "name", "nickname"]),
            EvolveMode::AddOnly,
        );

        assert_eq!(
            plan.statements,
            vec!["ALTER TABLE loam_user ADD COLUMN \"email\" text".to_string()]
        );
        assert_eq!(
            plan.warnings,
            vec!["table `loam_user` carries undeclared column `nickname`".to_string()]
        );
    }

    #[test]
    fn warn_mode_only_reports() {
        let schema = schema();
        let user = schema.model_by_name("User").unwrap().id;
        let plan = plan(&schema, user, &live(&["id", "name"]), EvolveMode::Warn);

        assert!(plan.statements.is_empty());
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn off_mode_does_nothing() {
        let schema = schema();
        let user = schema.model_by_name("User").unwrap().id;
        assert!(plan(&schema, user, &live(&["id"]), EvolveMode::Off).is_empty());
    }

    #[test]
    fn in_sync_table_plans_nothing() {
        let schema = schema();
        let user = schema.model_by_name("User").unwrap().id;
        assert!(plan(&schema, user, &live(&["id", "name", "email"]), EvolveMode::Full).is_empty());
    }
}
