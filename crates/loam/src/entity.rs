use loam_core::schema::ModelId;
use loam_core::stmt::Value;
use loam_core::Schema;

use indexmap::IndexMap;

/// Where an entity stands in its persistence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityState {
    /// Built in memory, no row yet.
    #[default]
    Transient,

    /// Backed by a row.
    Persisted,

    /// The backing row is gone.
    Deleted,
}

const NULL: Value = Value::Null;

/// A dynamic record: one value per effective attribute of its model, plus
/// the lifecycle state and any collection members staged for the next
/// save.
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) model: ModelId,
    pub(crate) values: IndexMap<String, Value>,
    pub(crate) state: EntityState,
    pub(crate) staged: Vec<(String, Entity)>,
}

impl Entity {
    /// A transient instance with every attribute null.
    pub fn new(schema: &Schema, model: ModelId) -> Self {
        let mut values = IndexMap::new();
        for attr in schema.effective_attributes(model) {
            values.insert(attr.name.clone(), Value::Null);
        }
        Self {
            model,
            values,
            state: EntityState::Transient,
            staged: vec![],
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn is_persisted(&self) -> bool {
        self.state == EntityState::Persisted
    }

    pub fn is_deleted(&self) -> bool {
        self.state == EntityState::Deleted
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL)
    }

    /// Attribute names and values, in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Stage a member of a collection relation; written out together with
    /// the next save of this entity.
    pub fn stage(&mut self, relation: &str, member: Entity) -> &mut Self {
        self.staged.push((relation.to_string(), member));
        self
    }

    pub fn staged(&self) -> &[(String, Entity)] {
        &self.staged
    }
}
