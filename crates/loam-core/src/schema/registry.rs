use super::{resolver, Attribute, Capability, Model, ModelId, Name, RelationDef, Schema};
use crate::driver::Dialect;
use crate::Result;

use indexmap::IndexMap;
use std::sync::Arc;

/// A model declaration under construction; the structured equivalent of
/// the original declaration macros.
#[derive(Debug)]
pub struct ModelDef {
    name: String,
    attributes: Vec<Attribute>,
    relations: Vec<RelationDef>,
    capabilities: Vec<Arc<dyn Capability>>,
    extends: Option<String>,
    table: Option<String>,
}

impl ModelDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: vec![],
            relations: vec![],
            capabilities: vec![],
            extends: None,
            table: None,
        }
    }

    pub fn attr(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Declare a single-table-inheritance parent. The child shares the
    /// parent's table; a discriminator column tells the rows apart.
    pub fn extends(mut self, parent: &str) -> Self {
        self.extends = Some(parent.to_string());
        self
    }

    /// Override the derived table name.
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn capability(mut self, capability: impl Capability + 'static) -> Self {
        self.capabilities.push(Arc::new(capability));
        self
    }

    pub fn relation(mut self, def: RelationDef) -> Self {
        self.relations.push(def);
        self
    }

    pub fn refers_to(self, target: &str) -> Self {
        self.relation(RelationDef::refers_to(target))
    }

    pub fn has_one(self, target: &str) -> Self {
        self.relation(RelationDef::has_one(target))
    }

    pub fn belongs_to(self, target: &str) -> Self {
        self.relation(RelationDef::belongs_to(target))
    }

    pub fn has_many(self, target: &str) -> Self {
        self.relation(RelationDef::has_many(target))
    }

    pub fn joins_many(self, target: &str) -> Self {
        self.relation(RelationDef::joins_many(target))
    }

    pub fn many_to_many(self, target: &str) -> Self {
        self.relation(RelationDef::many_to_many(target))
    }
}

/// The mutable collection of declared models. Declarations accumulate
/// here; [`Registry::resolve`] runs the resolution passes and freezes the
/// result into a [`Schema`].
#[derive(Debug)]
pub struct Registry {
    pub(crate) models: Vec<Model>,
    pub(crate) by_name: IndexMap<String, ModelId>,
    pub(crate) table_prefix: String,
    pub(crate) duplicates: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_table_prefix("loam_")
    }

    pub fn with_table_prefix(prefix: &str) -> Self {
        Self {
            models: vec![],
            by_name: IndexMap::new(),
            table_prefix: prefix.to_string(),
            duplicates: vec![],
        }
    }

    /// Register a model declaration. Capability attributes are appended
    /// after the declared ones; attributes already declared by name win.
    pub fn define(&mut self, def: ModelDef) -> ModelId {
        let id = ModelId(self.models.len());
        let name = Name::new(&def.name);

        let mut model = Model::new(name);
        model.id = id;
        model.attributes = def.attributes;
        model.extends = def.extends;
        model.table_override = def.table;

        for capability in &def.capabilities {
            for attr in capability.attributes() {
                if model.attribute(&attr.name).is_none() {
                    model.attributes.push(attr);
                }
            }
        }
        model.capabilities = def.capabilities;

        model.relations = def
            .relations
            .into_iter()
            .map(|r| r.into_relation(id))
            .collect();

        // A name collision is a declaration error; it surfaces when the
        // registry resolves, like every other configuration problem.
        if self.by_name.contains_key(&model.name.full()) {
            self.duplicates.push(model.name.full());
        }
        self.by_name.insert(model.name.full(), id);
        self.models.push(model);
        id
    }

    pub fn model(&self, id: ModelId) -> &Model {
        &self.models[id.0]
    }

    pub fn model_by_name(&self, name: &str) -> Option<&Model> {
        self.by_name.get(name).map(|id| self.model(*id))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Run the resolution passes and freeze the registry into a schema.
    /// Any configuration error aborts the whole resolution; no partially
    /// resolved schema is ever produced.
    pub fn resolve(self, dialect: Dialect) -> Result<Schema> {
        resolver::resolve(self, dialect)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
