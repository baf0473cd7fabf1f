//! The persistence engine: statement execution helpers and the per-model
//! column-position maps shared by the read and write paths.

pub(crate) mod read;
pub(crate) mod setup;
pub(crate) mod write;

use crate::Entity;

use loam_core::driver::{Connection, Rows};
use loam_core::schema::{AttrType, ModelId};
use loam_core::stmt::Value;
use loam_core::{Error, Result, Schema};

/// Where each of a model's attributes sits in a `table.*` result row.
/// Computed once from live introspection after setup; immutable afterwards.
#[derive(Debug)]
pub(crate) struct FieldMap {
    /// (attribute name, column position, declared type)
    pub(crate) positions: Vec<(String, usize, AttrType)>,
}

impl FieldMap {
    pub(crate) fn position(&self, attr: &str) -> Option<usize> {
        self.positions
            .iter()
            .find(|(name, _, _)| name == attr)
            .map(|(_, pos, _)| *pos)
    }
}

/// One optional map per model; polymorphic parents have none.
pub(crate) type FieldMaps = Vec<Option<FieldMap>>;

/// Run a write statement. With `raise` off a backend failure is logged
/// and reported as zero affected rows instead of propagating.
pub(crate) async fn exec_stmt(conn: &mut dyn Connection, sql: &str, raise: bool) -> Result<u64> {
    tracing::debug!(%sql, "exec");
    match conn.exec(sql).await {
        Ok(affected) => Ok(affected),
        Err(err) => {
            let err = err.with_statement(sql);
            if raise {
                Err(err)
            } else {
                tracing::error!(%err, "statement failed");
                Ok(0)
            }
        }
    }
}

/// Run a read statement. With `raise` off a backend failure is logged and
/// reported as an empty result.
pub(crate) async fn query_stmt(conn: &mut dyn Connection, sql: &str, raise: bool) -> Result<Rows> {
    tracing::debug!(%sql, "query");
    match conn.query(sql).await {
        Ok(rows) => Ok(rows),
        Err(err) => {
            let err = err.with_statement(sql);
            if raise {
                Err(err)
            } else {
                tracing::error!(%err, "query failed");
                Ok(Rows::default())
            }
        }
    }
}

pub(crate) fn pk_column(schema: &Schema, model: ModelId) -> String {
    schema
        .primary_key(model)
        .map(|a| a.column_name().to_string())
        .unwrap_or_else(|| "id".to_string())
}

pub(crate) fn pk_attr_name(schema: &Schema, model: ModelId) -> String {
    schema
        .primary_key(model)
        .map(|a| a.name.clone())
        .unwrap_or_else(|| "id".to_string())
}

/// The entity's primary-key value; an entity without one has never been
/// saved.
pub(crate) fn pk_value(schema: &Schema, entity: &Entity) -> Result<Value> {
    let name = pk_attr_name(schema, entity.model());
    let value = entity.get(&name).clone();
    if value.is_null() {
        return Err(Error::validation(format!(
            "`{}` instance has no primary key value; save it first",
            schema.model(entity.model()).name.full()
        )));
    }
    Ok(value)
}
