use crate::engine::{self, read, setup, write, FieldMaps};
use crate::pool::{Pool, PoolConfig, PoolConnection};
use crate::{Entity, EntityState, Transaction};

use loam_core::driver::Driver;
use loam_core::schema::{EvolveMode, ModelId, Registry};
use loam_core::stmt::Value;
use loam_core::{Error, Result, Schema};
use loam_sql::{FindOptions, Scope, ScopeGuard, ScopeStack};

use std::sync::Arc;

/// Setup options for a [`Manager`].
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// How schema evolution reacts to drift on already-existing tables.
    pub evolve: EvolveMode,

    /// With this off, failing statements are logged and report empty
    /// results instead of propagating backend errors.
    pub raise_errors: bool,

    pub pool: PoolConfig,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            evolve: EvolveMode::default(),
            raise_errors: true,
            pool: PoolConfig::default(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) schema: Schema,
    pub(crate) pool: Pool,
    pub(crate) maps: FieldMaps,
    pub(crate) raise_errors: bool,
}

/// The entry point: resolves declared models into a schema, sets the
/// backing store up, and runs entity operations over pooled connections.
/// Cloning is cheap; clones share the schema and pool, but each handle
/// carries its own scope stack, so a scope pushed on one handle never
/// constrains queries issued through another.
#[derive(Debug)]
pub struct Manager {
    shared: Arc<Shared>,
    scopes: ScopeStack,
}

impl Clone for Manager {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            scopes: ScopeStack::new(),
        }
    }
}

impl Manager {
    /// Resolve the registry against the driver's dialect and bring the
    /// backing store up to date. Resolution failure aborts setup; no
    /// partially-managed schema survives.
    pub async fn setup(driver: impl Driver, registry: Registry) -> Result<Self> {
        Self::setup_with(driver, registry, ManagerOptions::default()).await
    }

    pub async fn setup_with(
        driver: impl Driver,
        registry: Registry,
        options: ManagerOptions,
    ) -> Result<Self> {
        let schema = registry.resolve(driver.dialect())?;
        let pool = Pool::with_config(driver, options.pool)?;

        let mut conn = pool.get().await?;
        let maps = setup::create_schema(&schema, conn.connection(), options.evolve).await?;
        drop(conn);

        Ok(Self {
            shared: Arc::new(Shared {
                schema,
                pool,
                maps,
                raise_errors: options.raise_errors,
            }),
            scopes: ScopeStack::new(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    pub fn model_id(&self, name: &str) -> Result<ModelId> {
        self.shared
            .schema
            .model_by_name(name)
            .map(|m| m.id)
            .ok_or_else(|| Error::configuration(format!("`{name}` is not a managed model")))
    }

    /// A new transient entity of the named model.
    pub fn entity(&self, name: &str) -> Result<Entity> {
        Ok(Entity::new(&self.shared.schema, self.model_id(name)?))
    }

    /// Build an entity from attribute pairs and insert it right away.
    pub async fn create(&self, model: &str, attrs: &[(&str, Value)]) -> Result<Entity> {
        let mut entity = self.entity(model)?;
        for (name, value) in attrs {
            entity.set(name, value.clone());
        }
        self.save(&mut entity).await?;
        Ok(entity)
    }

    /// Activate a scope on this handle; it applies to every find/aggregate
    /// issued through it until the returned guard drops.
    pub fn scope(&self, scope: Scope) -> ScopeGuard {
        self.scopes.push(scope)
    }

    /// Start a transaction on a pinned connection. The transaction sees
    /// the scopes active on this handle.
    pub async fn transaction(&self) -> Result<Transaction> {
        Transaction::start(self.shared.clone(), self.scopes.clone()).await
    }

    /// Insert or update, depending on the entity's lifecycle state.
    pub async fn save(&self, entity: &mut Entity) -> Result<()> {
        let mut conn = self.conn().await?;
        write::save(&self.shared.schema, conn.connection(), entity, self.raise()).await
    }

    /// Update a subset of the entity's attributes.
    pub async fn update_attrs(&self, entity: &mut Entity, only: &[&str]) -> Result<u64> {
        let mut conn = self.conn().await?;
        write::update(
            &self.shared.schema,
            conn.connection(),
            entity,
            Some(only),
            self.raise(),
        )
        .await
    }

    /// Delete the entity's row; with `cascade`, everything the descendant
    /// graph marks as owned goes with it, in one transaction.
    pub async fn delete(&self, entity: &mut Entity, cascade: bool) -> Result<()> {
        let pk = engine::pk_value(&self.shared.schema, entity)?;
        let mut conn = self.conn().await?;
        write::delete(
            &self.shared.schema,
            conn.connection(),
            entity.model(),
            &pk,
            cascade,
            true,
            self.raise(),
        )
        .await?;
        entity.state = EntityState::Deleted;
        Ok(())
    }

    pub async fn delete_all(&self, model: &str) -> Result<u64> {
        let model = self.model_id(model)?;
        let mut conn = self.conn().await?;
        write::delete_all(&self.shared.schema, conn.connection(), model, self.raise()).await
    }

    pub async fn load(&self, model: &str, pk: impl Into<Value>) -> Result<Option<Entity>> {
        let model = self.model_id(model)?;
        let mut conn = self.conn().await?;
        read::load(
            &self.shared.schema,
            &self.shared.maps,
            conn.connection(),
            model,
            &pk.into(),
            self.raise(),
        )
        .await
    }

    pub async fn reload(&self, entity: &mut Entity) -> Result<()> {
        let mut conn = self.conn().await?;
        read::reload(
            &self.shared.schema,
            &self.shared.maps,
            conn.connection(),
            entity,
            self.raise(),
        )
        .await
    }

    pub async fn find(&self, model: &str, options: &FindOptions) -> Result<Vec<Entity>> {
        let model = self.model_id(model)?;
        let scope = self.scopes.current();
        let mut conn = self.conn().await?;
        read::find(
            &self.shared.schema,
            &self.shared.maps,
            conn.connection(),
            model,
            options,
            scope.as_ref(),
            self.raise(),
        )
        .await
    }

    pub async fn find_one(&self, model: &str, options: &FindOptions) -> Result<Option<Entity>> {
        let model = self.model_id(model)?;
        let scope = self.scopes.current();
        let mut conn = self.conn().await?;
        read::find_one(
            &self.shared.schema,
            &self.shared.maps,
            conn.connection(),
            model,
            options,
            scope.as_ref(),
            self.raise(),
        )
        .await
    }

    pub async fn count(&self, model: &str, options: &FindOptions) -> Result<i64> {
        let rows = self.aggregate_rows(model, "count(*)", options).await?;
        match rows.first_value() {
            Some(value) => value.clone().cast(loam_core::schema::AttrType::BigInt)?.to_i64(),
            None => Ok(0),
        }
    }

    pub async fn minimum(&self, model: &str, attr: &str, options: &FindOptions) -> Result<Value> {
        self.field_aggregate(model, "min", attr, options).await
    }

    pub async fn maximum(&self, model: &str, attr: &str, options: &FindOptions) -> Result<Value> {
        self.field_aggregate(model, "max", attr, options).await
    }

    pub async fn average(&self, model: &str, attr: &str, options: &FindOptions) -> Result<Value> {
        self.field_aggregate(model, "avg", attr, options).await
    }

    pub async fn sum(&self, model: &str, attr: &str, options: &FindOptions) -> Result<Value> {
        self.field_aggregate(model, "sum", attr, options).await
    }

    /// A grouped aggregate; returns the raw result rows, uncast.
    pub async fn summarize(
        &self,
        model: &str,
        term: &str,
        options: &FindOptions,
    ) -> Result<Vec<Vec<Value>>> {
        let rows = self.aggregate_rows(model, term, options).await?;
        Ok(rows.rows)
    }

    /// An aggregate over one attribute, cast to the attribute's declared
    /// type.
    async fn field_aggregate(
        &self,
        model: &str,
        func: &str,
        attr: &str,
        options: &FindOptions,
    ) -> Result<Value> {
        let id = self.model_id(model)?;
        let ty = self
            .shared
            .schema
            .effective_attributes(id)
            .into_iter()
            .find(|a| a.name == attr)
            .map(|a| a.ty)
            .ok_or_else(|| {
                Error::configuration(format!("`{model}` has no attribute `{attr}`"))
            })?;

        let term = format!("{func}({attr})");
        let rows = self.aggregate_rows(model, &term, options).await?;
        match rows.first_value() {
            Some(value) => value.clone().cast(ty),
            None => Ok(Value::Null),
        }
    }

    async fn aggregate_rows(
        &self,
        model: &str,
        term: &str,
        options: &FindOptions,
    ) -> Result<loam_core::driver::Rows> {
        let model = self.model_id(model)?;
        let scope = self.scopes.current();
        let mut conn = self.conn().await?;
        read::aggregate(
            &self.shared.schema,
            conn.connection(),
            model,
            term,
            options,
            scope.as_ref(),
            self.raise(),
        )
        .await
    }

    /// Connect two entities through a many-to-many relation.
    pub async fn link(&self, owner: &Entity, relation: &str, target: &Entity) -> Result<()> {
        let mut conn = self.conn().await?;
        write::link(
            &self.shared.schema,
            conn.connection(),
            owner,
            relation,
            target,
            self.raise(),
        )
        .await
    }

    /// Disconnect two entities linked through a many-to-many relation.
    pub async fn unlink(&self, owner: &Entity, relation: &str, target: &Entity) -> Result<u64> {
        let mut conn = self.conn().await?;
        write::unlink(
            &self.shared.schema,
            conn.connection(),
            owner,
            relation,
            target,
            self.raise(),
        )
        .await
    }

    async fn conn(&self) -> Result<PoolConnection> {
        self.shared.pool.get().await
    }

    fn raise(&self) -> bool {
        self.shared.raise_errors
    }
}
