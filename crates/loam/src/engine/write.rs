//! Insert, update, delete and join-row maintenance.

use super::{exec_stmt, pk_attr_name, pk_column, pk_value, query_stmt};
use crate::{Entity, EntityState};

use loam_core::driver::Connection;
use loam_core::schema::{Capability, Descendant, ModelId, RelationKind};
use loam_core::stmt::Value;
use loam_core::{Error, Result, Schema};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Capabilities along the inheritance chain, root first.
fn capabilities(schema: &Schema, model: ModelId) -> Vec<Arc<dyn Capability>> {
    let mut chain = vec![model];
    let mut cur = model;
    while let Some(parent) = schema.model(cur).parent {
        chain.push(parent);
        cur = parent;
    }

    let mut caps = vec![];
    for id in chain.into_iter().rev() {
        caps.extend(schema.model(id).capabilities.iter().cloned());
    }
    caps
}

/// Insert or update depending on lifecycle state.
pub(crate) async fn save(
    schema: &Schema,
    conn: &mut dyn Connection,
    entity: &mut Entity,
    raise: bool,
) -> Result<()> {
    match entity.state() {
        EntityState::Transient => insert(schema, conn, entity, raise).await,
        EntityState::Persisted => {
            update(schema, conn, entity, None, raise).await?;
            Ok(())
        }
        EntityState::Deleted => Err(Error::deleted(format!(
            "cannot save a deleted `{}` instance",
            schema.model(entity.model()).name.full()
        ))),
    }
}

pub(crate) async fn insert(
    schema: &Schema,
    conn: &mut dyn Connection,
    entity: &mut Entity,
    raise: bool,
) -> Result<()> {
    let model = entity.model();
    let m = schema.model(model);
    let dialect = schema.dialect();

    for cap in capabilities(schema, model) {
        cap.before_insert(&mut entity.values);
    }
    for cap in capabilities(schema, model) {
        cap.validate(&entity.values)?;
    }

    if m.in_sti_tree() {
        entity
            .values
            .insert("model_type".to_string(), m.name.full().into());
    }

    let mut columns = vec![];
    let mut literals = vec![];
    for attr in schema.effective_attributes(model) {
        let value = entity.get(&attr.name);
        // The backend assigns generated keys.
        if attr.auto_increment && value.is_null() {
            continue;
        }
        columns.push(attr.column_name().to_string());
        literals.push(dialect.quote(value));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        m.table,
        columns.join(", "),
        literals.join(", ")
    );
    exec_stmt(conn, &sql, raise).await?;

    let pk_name = pk_attr_name(schema, model);
    let auto = schema
        .primary_key(model)
        .map(|a| a.auto_increment)
        .unwrap_or(false);
    if auto && entity.get(&pk_name).is_null() {
        let id = conn.last_insert_id().await?;
        entity.values.insert(pk_name, Value::I64(id));
    }

    entity.state = EntityState::Persisted;
    flush_staged(schema, conn, entity, raise).await
}

/// Write out collection members staged on the entity: one-to-many members
/// get the owner's key and are saved; many-to-many members are saved if
/// needed and linked through the join table.
async fn flush_staged(
    schema: &Schema,
    conn: &mut dyn Connection,
    entity: &mut Entity,
    raise: bool,
) -> Result<()> {
    if entity.staged.is_empty() {
        return Ok(());
    }

    let model = entity.model();
    let owner_pk = pk_value(schema, entity)?;
    let staged = std::mem::take(&mut entity.staged);

    for (name, mut member) in staged {
        let rel = schema.relation(model, &name).ok_or_else(|| {
            Error::configuration(format!(
                "unknown relation `{name}` staged on `{}`",
                schema.model(model).name.full()
            ))
        })?;

        match rel.kind {
            RelationKind::HasMany => {
                member
                    .values
                    .insert(rel.foreign_key().to_string(), owner_pk.clone());
                Box::pin(save(schema, conn, &mut member, raise)).await?;
            }
            RelationKind::JoinsMany => {
                if !member.is_persisted() {
                    Box::pin(save(schema, conn, &mut member, raise)).await?;
                }
                let join = rel.join.as_ref().expect("joins-many relation has a join table");
                let member_pk = pk_value(schema, &member)?;
                let dialect = schema.dialect();
                let sql = format!(
                    "INSERT INTO {} ({}, {}) VALUES ({}, {})",
                    join.table,
                    join.owner_key,
                    join.target_key,
                    dialect.quote(&owner_pk),
                    dialect.quote(&member_pk)
                );
                exec_stmt(conn, &sql, raise).await?;
            }
            _ => {
                return Err(Error::configuration(format!(
                    "relation `{name}` on `{}` is not a collection; only collection \
                     members can be staged",
                    schema.model(model).name.full()
                )))
            }
        }
    }
    Ok(())
}

/// Update the row backing the entity. `only` limits the written columns.
/// Returns the number of affected rows.
pub(crate) async fn update(
    schema: &Schema,
    conn: &mut dyn Connection,
    entity: &mut Entity,
    only: Option<&[&str]>,
    raise: bool,
) -> Result<u64> {
    let model = entity.model();
    let m = schema.model(model);
    let dialect = schema.dialect();

    for cap in capabilities(schema, model) {
        cap.before_update(&mut entity.values);
    }
    for cap in capabilities(schema, model) {
        cap.validate(&entity.values)?;
    }

    let pk = pk_value(schema, entity)?;
    let pk_name = pk_attr_name(schema, model);

    let mut sets = vec![];
    for attr in schema.effective_attributes(model) {
        if attr.name == pk_name {
            continue;
        }
        if let Some(only) = only {
            if !only.contains(&attr.name.as_str()) {
                continue;
            }
        }
        sets.push(format!(
            "{} = {}",
            attr.column_name(),
            dialect.quote(entity.get(&attr.name))
        ));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        m.table,
        sets.join(", "),
        pk_column(schema, model),
        dialect.quote(&pk)
    );
    let affected = exec_stmt(conn, &sql, raise).await?;
    flush_staged(schema, conn, entity, raise).await?;
    Ok(affected)
}

/// Delete the row with the given key, optionally cascading over the
/// precomputed descendant graph. With `manage_tx` the whole cascade runs
/// in one backend transaction; callers holding a transaction pass false.
pub(crate) async fn delete(
    schema: &Schema,
    conn: &mut dyn Connection,
    model: ModelId,
    pk: &Value,
    cascade: bool,
    manage_tx: bool,
    raise: bool,
) -> Result<()> {
    if !manage_tx {
        return delete_rows(schema, conn, model, pk, cascade, raise).await;
    }

    conn.begin().await?;
    match delete_rows(schema, conn, model, pk, cascade, raise).await {
        Ok(()) => conn.commit().await,
        Err(err) => {
            let _ = conn.rollback().await;
            Err(err)
        }
    }
}

fn delete_rows<'a>(
    schema: &'a Schema,
    conn: &'a mut dyn Connection,
    model: ModelId,
    pk: &'a Value,
    cascade: bool,
    raise: bool,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let dialect = schema.dialect();

        if cascade {
            for desc in schema.descendants(model) {
                match desc {
                    Descendant::Join { table, owner_key } => {
                        let sql = format!(
                            "DELETE FROM {table} WHERE {owner_key} = {}",
                            dialect.quote(pk)
                        );
                        exec_stmt(conn, &sql, raise).await?;
                    }
                    Descendant::Owned { model: child, foreign_key } => {
                        let cm = schema.model(*child);
                        let mut sql = format!(
                            "SELECT {} FROM {} WHERE {foreign_key} = {}",
                            pk_column(schema, *child),
                            cm.table,
                            dialect.quote(pk)
                        );
                        if cm.is_sti_child() {
                            sql.push_str(&format!(
                                " AND model_type = {}",
                                dialect.quote(&Value::String(cm.name.full()))
                            ));
                        }
                        let rows = query_stmt(conn, &sql, raise).await?;
                        let ids: Vec<Value> = rows
                            .rows
                            .iter()
                            .filter_map(|row| row.first().cloned())
                            .collect();
                        for id in ids {
                            delete_rows(schema, &mut *conn, *child, &id, true, raise).await?;
                        }
                    }
                }
            }
        }

        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            schema.model(model).table,
            pk_column(schema, model),
            dialect.quote(pk)
        );
        exec_stmt(conn, &sql, raise).await?;
        Ok(())
    })
}

/// Delete every row of a model. An inheritance child deletes only its own
/// rows out of the shared table.
pub(crate) async fn delete_all(
    schema: &Schema,
    conn: &mut dyn Connection,
    model: ModelId,
    raise: bool,
) -> Result<u64> {
    let m = schema.model(model);
    let sql = if m.is_sti_child() {
        format!(
            "DELETE FROM {} WHERE model_type = {}",
            m.table,
            schema.dialect().quote(&Value::String(m.name.full()))
        )
    } else {
        format!("DELETE FROM {}", m.table)
    };
    exec_stmt(conn, &sql, raise).await
}

/// Insert a join-table row connecting two persisted entities.
pub(crate) async fn link(
    schema: &Schema,
    conn: &mut dyn Connection,
    owner: &Entity,
    relation: &str,
    target: &Entity,
    raise: bool,
) -> Result<()> {
    let (join, owner_pk, target_pk) = join_facts(schema, owner, relation, target)?;
    let dialect = schema.dialect();
    let sql = format!(
        "INSERT INTO {} ({}, {}) VALUES ({}, {})",
        join.table,
        join.owner_key,
        join.target_key,
        dialect.quote(&owner_pk),
        dialect.quote(&target_pk)
    );
    exec_stmt(conn, &sql, raise).await?;
    Ok(())
}

/// Remove the join-table row connecting two entities.
pub(crate) async fn unlink(
    schema: &Schema,
    conn: &mut dyn Connection,
    owner: &Entity,
    relation: &str,
    target: &Entity,
    raise: bool,
) -> Result<u64> {
    let (join, owner_pk, target_pk) = join_facts(schema, owner, relation, target)?;
    let dialect = schema.dialect();
    let sql = format!(
        "DELETE FROM {} WHERE {} = {} AND {} = {}",
        join.table,
        join.owner_key,
        dialect.quote(&owner_pk),
        join.target_key,
        dialect.quote(&target_pk)
    );
    exec_stmt(conn, &sql, raise).await
}

fn join_facts<'a>(
    schema: &'a Schema,
    owner: &Entity,
    relation: &str,
    target: &Entity,
) -> Result<(&'a loam_core::schema::JoinTableInfo, Value, Value)> {
    let rel = schema.relation(owner.model(), relation).ok_or_else(|| {
        Error::configuration(format!(
            "unknown relation `{relation}` on `{}`",
            schema.model(owner.model()).name.full()
        ))
    })?;
    let join = rel.join.as_ref().ok_or_else(|| {
        Error::configuration(format!(
            "relation `{relation}` on `{}` has no join table",
            schema.model(owner.model()).name.full()
        ))
    })?;
    Ok((join, pk_value(schema, owner)?, pk_value(schema, target)?))
}
