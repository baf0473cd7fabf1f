//! Schema creation and evolution: run at setup, before any entity
//! operation.

use super::{FieldMap, FieldMaps};

use loam_core::driver::Connection;
use loam_core::schema::EvolveMode;
use loam_core::{Result, Schema};
use loam_sql::{ddl, evolution};

use std::collections::HashSet;

/// Create every table the schema maps to, evolve the ones that already
/// exist, and introspect the final column layout into field maps.
///
/// A "table already exists" signal from the backend is not a failure:
/// the table is evolved instead. Any other failure aborts setup with the
/// failing statement attached.
pub(crate) async fn create_schema(
    schema: &Schema,
    conn: &mut dyn Connection,
    evolve: EvolveMode,
) -> Result<FieldMaps> {
    for model in schema.models() {
        // Parents are never persisted; children share the root's table.
        if model.is_polymorphic_parent() || model.is_sti_child() {
            continue;
        }

        let create = ddl::create_table(schema, model.id);
        match conn.exec(&create).await {
            Ok(_) => {
                tracing::info!(table = %model.table, "created table");
                for stmt in ddl::create_indices(schema, model.id) {
                    conn.exec(&stmt).await.map_err(|e| e.with_statement(&*stmt))?;
                }
            }
            Err(err) if err.is_table_exists() => {
                tracing::info!(table = %model.table, "table exists, evolving");
                evolve_table(schema, conn, model.id, evolve).await?;
            }
            Err(err) => return Err(err.with_statement(create)),
        }
    }

    create_join_tables(schema, conn).await?;
    build_field_maps(schema, conn).await
}

async fn evolve_table(
    schema: &Schema,
    conn: &mut dyn Connection,
    model: loam_core::schema::ModelId,
    evolve: EvolveMode,
) -> Result<()> {
    if evolve == EvolveMode::Off {
        return Ok(());
    }

    let table = &schema.model(model).table;
    let live = conn.table_columns(table).await?;
    let plan = evolution::plan(schema, model, &live, evolve);
    for warning in &plan.warnings {
        tracing::warn!("{warning}");
    }
    for stmt in &plan.statements {
        conn.exec(stmt).await.map_err(|e| e.with_statement(&**stmt))?;
        tracing::info!(%stmt, "evolved table");
    }
    Ok(())
}

async fn create_join_tables(schema: &Schema, conn: &mut dyn Connection) -> Result<()> {
    let mut seen = HashSet::new();
    for model in schema.models() {
        if model.is_polymorphic_parent() {
            continue;
        }
        for rel in &model.relations {
            let Some(join) = &rel.join else { continue };
            // A join realized through a user-defined model uses that
            // model's own table, created above.
            if rel.through.is_some() {
                continue;
            }
            if !seen.insert(join.table.clone()) {
                continue;
            }

            let stmts = ddl::create_join_table(schema.dialect(), join);
            match conn.exec(&stmts[0]).await {
                Ok(_) => {
                    tracing::info!(table = %join.table, "created join table");
                    for stmt in &stmts[1..] {
                        conn.exec(stmt).await.map_err(|e| e.with_statement(&**stmt))?;
                    }
                }
                Err(err) if err.is_table_exists() => {
                    tracing::info!(table = %join.table, "join table exists");
                }
                Err(err) => return Err(err.with_statement(&*stmts[0])),
            }
        }
    }
    Ok(())
}

/// Introspect each model's live table into its column-position map.
async fn build_field_maps(schema: &Schema, conn: &mut dyn Connection) -> Result<FieldMaps> {
    let mut maps = Vec::new();
    for model in schema.models() {
        if model.is_polymorphic_parent() {
            maps.push(None);
            continue;
        }

        let live = conn.table_columns(&model.table).await?;
        let mut positions = vec![];
        for attr in schema.effective_attributes(model.id) {
            if let Some(pos) = live.iter().position(|c| c == attr.column_name()) {
                positions.push((attr.name.clone(), pos, attr.ty));
            }
        }
        maps.push(Some(FieldMap { positions }));
    }
    Ok(maps)
}
