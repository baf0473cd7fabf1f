use crate::engine::{self, read, write};
use crate::manager::Shared;
use crate::pool::PoolConnection;
use crate::{Entity, EntityState};

use loam_core::stmt::Value;
use loam_core::{Error, Result};
use loam_sql::{FindOptions, ScopeStack};

use std::sync::Arc;

/// A transaction pinned to one connection. Transactions nest by counting:
/// inner `begin`/`commit` pairs are bookkeeping only, and only the
/// outermost commit reaches the backend. A rollback anywhere poisons the
/// whole transaction; the outermost commit then rolls back instead.
/// Dropping an unfinished handle discards its connection instead of
/// returning it to the pool, so the open backend transaction dies with it.
pub struct Transaction {
    shared: Arc<Shared>,
    scopes: ScopeStack,
    conn: PoolConnection,
    depth: u32,
    poisoned: bool,
}

impl Transaction {
    pub(crate) async fn start(shared: Arc<Shared>, scopes: ScopeStack) -> Result<Self> {
        let mut conn = shared.pool.get().await?;
        conn.connection().begin().await?;
        conn.set_tx_open(true);
        Ok(Self {
            shared,
            scopes,
            conn,
            depth: 1,
            poisoned: false,
        })
    }

    /// Enter a nested transaction level.
    pub fn begin(&mut self) {
        self.depth += 1;
    }

    /// Leave the current level; at the outermost level the transaction
    /// commits for real, unless a nested rollback poisoned it.
    pub async fn commit(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::configuration("transaction already finished"));
        }
        self.depth -= 1;
        if self.depth > 0 {
            return Ok(());
        }

        if self.poisoned {
            self.conn.connection().rollback().await?;
            self.conn.set_tx_open(false);
            return Err(Error::configuration(
                "transaction rolled back: a nested level was aborted",
            ));
        }
        self.conn.connection().commit().await?;
        self.conn.set_tx_open(false);
        Ok(())
    }

    /// Abort the current level. Inside a nested level this poisons the
    /// transaction; at the outermost level it rolls back immediately.
    pub async fn rollback(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::configuration("transaction already finished"));
        }
        self.depth -= 1;
        if self.depth > 0 {
            self.poisoned = true;
            return Ok(());
        }
        self.conn.connection().rollback().await?;
        self.conn.set_tx_open(false);
        Ok(())
    }

    pub async fn save(&mut self, entity: &mut Entity) -> Result<()> {
        write::save(
            &self.shared.schema,
            self.conn.connection(),
            entity,
            self.shared.raise_errors,
        )
        .await
    }

    pub async fn update_attrs(&mut self, entity: &mut Entity, only: &[&str]) -> Result<u64> {
        write::update(
            &self.shared.schema,
            self.conn.connection(),
            entity,
            Some(only),
            self.shared.raise_errors,
        )
        .await
    }

    /// Delete within the transaction; no inner transaction is opened,
    /// the cascade rides on this one.
    pub async fn delete(&mut self, entity: &mut Entity, cascade: bool) -> Result<()> {
        let pk = engine::pk_value(&self.shared.schema, entity)?;
        write::delete(
            &self.shared.schema,
            self.conn.connection(),
            entity.model(),
            &pk,
            cascade,
            false,
            self.shared.raise_errors,
        )
        .await?;
        entity.state = EntityState::Deleted;
        Ok(())
    }

    pub async fn load(&mut self, model: &str, pk: impl Into<Value>) -> Result<Option<Entity>> {
        let model = self.model_id(model)?;
        read::load(
            &self.shared.schema,
            &self.shared.maps,
            self.conn.connection(),
            model,
            &pk.into(),
            self.shared.raise_errors,
        )
        .await
    }

    pub async fn reload(&mut self, entity: &mut Entity) -> Result<()> {
        read::reload(
            &self.shared.schema,
            &self.shared.maps,
            self.conn.connection(),
            entity,
            self.shared.raise_errors,
        )
        .await
    }

    pub async fn find(&mut self, model: &str, options: &FindOptions) -> Result<Vec<Entity>> {
        let model = self.model_id(model)?;
        let scope = self.scopes.current();
        read::find(
            &self.shared.schema,
            &self.shared.maps,
            self.conn.connection(),
            model,
            options,
            scope.as_ref(),
            self.shared.raise_errors,
        )
        .await
    }

    pub async fn find_one(&mut self, model: &str, options: &FindOptions) -> Result<Option<Entity>> {
        let model = self.model_id(model)?;
        let scope = self.scopes.current();
        read::find_one(
            &self.shared.schema,
            &self.shared.maps,
            self.conn.connection(),
            model,
            options,
            scope.as_ref(),
            self.shared.raise_errors,
        )
        .await
    }

    fn model_id(&self, name: &str) -> Result<loam_core::schema::ModelId> {
        self.shared
            .schema
            .model_by_name(name)
            .map(|m| m.id)
            .ok_or_else(|| Error::configuration(format!("`{name}` is not a managed model")))
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // An unfinished handle leaves its backend transaction open; the
        // connection stays flagged, so the pool discards it.
        if self.depth > 0 {
            tracing::warn!("transaction dropped without commit or rollback; discarding its connection");
        }
    }
}
