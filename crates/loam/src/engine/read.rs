//! Row reading: result rows back into entities, loads and reloads,
//! aggregates.

use super::{pk_column, pk_value, query_stmt, FieldMaps};
use crate::{Entity, EntityState};

use loam_core::driver::{Connection, Rows};
use loam_core::schema::ModelId;
use loam_core::stmt::Value;
use loam_core::{Error, Result, Schema};
use loam_sql::{compile_aggregate, compile_find, Condition, FindOptions, Op, Scope};

pub(crate) async fn find(
    schema: &Schema,
    maps: &FieldMaps,
    conn: &mut dyn Connection,
    model: ModelId,
    options: &FindOptions,
    scope: Option<&Scope>,
    raise: bool,
) -> Result<Vec<Entity>> {
    let sql = compile_find(schema, model, options, scope)?;
    let rows = query_stmt(conn, &sql, raise).await?;
    rows.rows
        .iter()
        .map(|row| read_row(schema, maps, model, row))
        .collect()
}

pub(crate) async fn find_one(
    schema: &Schema,
    maps: &FieldMaps,
    conn: &mut dyn Connection,
    model: ModelId,
    options: &FindOptions,
    scope: Option<&Scope>,
    raise: bool,
) -> Result<Option<Entity>> {
    let options = options.clone().limit(1);
    let mut found = find(schema, maps, conn, model, &options, scope, raise).await?;
    Ok(if found.is_empty() {
        None
    } else {
        Some(found.swap_remove(0))
    })
}

/// Turn one result row into an entity. For an inheritance root the
/// discriminator column picks the concrete model; columns the map does
/// not know are ignored.
pub(crate) fn read_row(
    schema: &Schema,
    maps: &FieldMaps,
    model: ModelId,
    row: &[Value],
) -> Result<Entity> {
    let mut concrete = model;
    if schema.model(model).is_sti_root() {
        if let Some(map) = &maps[model.0] {
            if let Some(pos) = map.position("model_type") {
                if let Some(Value::String(name)) = row.get(pos) {
                    if let Some(m) = schema.model_by_name(name) {
                        concrete = m.id;
                    }
                }
            }
        }
    }

    let map = maps[concrete.0].as_ref().ok_or_else(|| {
        Error::configuration(format!(
            "`{}` has no column map; was setup run?",
            schema.model(concrete).name.full()
        ))
    })?;

    let mut entity = Entity::new(schema, concrete);
    for (attr, pos, ty) in &map.positions {
        if let Some(value) = row.get(*pos) {
            entity.values.insert(attr.clone(), value.clone().cast(*ty)?);
        }
    }
    entity.state = EntityState::Persisted;
    Ok(entity)
}

/// Load one entity by primary key.
pub(crate) async fn load(
    schema: &Schema,
    maps: &FieldMaps,
    conn: &mut dyn Connection,
    model: ModelId,
    pk: &Value,
    raise: bool,
) -> Result<Option<Entity>> {
    let table = &schema.model(model).table;
    let options = FindOptions::new()
        .condition(Condition::qualified(
            table,
            &pk_column(schema, model),
            Op::Eq,
            pk.clone(),
        ))
        .limit(1);
    find_one(schema, maps, conn, model, &options, None, raise).await
}

/// Re-read the entity's row. A vanished row marks the entity deleted and
/// fails loudly; it never silently succeeds.
pub(crate) async fn reload(
    schema: &Schema,
    maps: &FieldMaps,
    conn: &mut dyn Connection,
    entity: &mut Entity,
    raise: bool,
) -> Result<()> {
    let pk = pk_value(schema, entity)?;
    match load(schema, maps, conn, entity.model(), &pk, raise).await? {
        Some(fresh) => {
            entity.values = fresh.values;
            entity.state = EntityState::Persisted;
            Ok(())
        }
        None => {
            entity.state = EntityState::Deleted;
            Err(Error::deleted(format!(
                "{}[{}]",
                schema.model(entity.model()).name.full(),
                schema.dialect().quote(&pk)
            )))
        }
    }
}

/// Run an aggregate and hand back the raw result rows; callers cast.
pub(crate) async fn aggregate(
    schema: &Schema,
    conn: &mut dyn Connection,
    model: ModelId,
    term: &str,
    options: &FindOptions,
    scope: Option<&Scope>,
    raise: bool,
) -> Result<Rows> {
    let sql = compile_aggregate(schema, model, term, options, scope)?;
    query_stmt(conn, &sql, raise).await
}
