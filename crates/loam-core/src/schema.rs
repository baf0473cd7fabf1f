mod attr;
pub use attr::{AttrType, Attribute};

mod capability;
pub use capability::{Capability, Required, Timestamps};

mod diff;
pub use diff::{EvolveMode, SchemaDiff};

pub mod mapper;

mod model;
pub use model::{Model, ModelId, Polymorphic};

mod name;
pub use name::{plural, singular, Name};

mod registry;
pub use registry::{ModelDef, Registry};

mod relation;
pub use relation::{JoinTableInfo, Relation, RelationDef, RelationKind, TargetRef};

pub(crate) mod resolver;

use crate::driver::Dialect;

use indexmap::IndexMap;

/// One entry in a model's cascade graph: something that goes away when a
/// row of that model is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descendant {
    /// Rows of `model` whose `foreign_key` column references the deleted
    /// row; deleted recursively.
    Owned { model: ModelId, foreign_key: String },

    /// Join-table rows whose `owner_key` column references the deleted
    /// row; deleted directly.
    Join { table: String, owner_key: String },
}

/// The frozen result of resolving a [`Registry`]: every relation target
/// concrete, every name and table derived, the cascade graph precomputed.
/// Never mutated after construction.
#[derive(Debug)]
pub struct Schema {
    pub(crate) models: Vec<Model>,
    pub(crate) by_name: IndexMap<String, ModelId>,
    pub(crate) descendants: Vec<Vec<Descendant>>,
    pub(crate) table_prefix: String,
    pub(crate) dialect: Dialect,
}

impl Schema {
    pub fn model(&self, id: ModelId) -> &Model {
        &self.models[id.0]
    }

    pub fn model_by_name(&self, name: &str) -> Option<&Model> {
        self.by_name.get(name).map(|id| self.model(*id))
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn descendants(&self, id: ModelId) -> &[Descendant] {
        &self.descendants[id.0]
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The root of a model's inheritance chain; the model itself when it
    /// has no parent.
    pub fn sti_root(&self, id: ModelId) -> ModelId {
        let mut cur = id;
        while let Some(parent) = self.models[cur.0].parent {
            cur = parent;
        }
        cur
    }

    /// A model's attributes including inherited ones, root first.
    pub fn effective_attributes(&self, id: ModelId) -> Vec<&Attribute> {
        let mut chain = vec![id];
        let mut cur = id;
        while let Some(parent) = self.models[cur.0].parent {
            chain.push(parent);
            cur = parent;
        }

        let mut attrs = vec![];
        for model_id in chain.into_iter().rev() {
            attrs.extend(self.models[model_id.0].attributes.iter());
        }
        attrs
    }

    /// All columns of a model's physical table: the root's effective
    /// attributes plus those declared anywhere in the inheritance tree,
    /// deduplicated by column name.
    pub fn table_attributes(&self, id: ModelId) -> Vec<&Attribute> {
        let root = self.sti_root(id);

        let mut attrs: Vec<&Attribute> = self.models[root.0].attributes.iter().collect();
        let mut pending = self.models[root.0].sti_children.clone();
        while let Some(child) = pending.pop() {
            for attr in &self.models[child.0].attributes {
                if !attrs.iter().any(|a| a.column_name() == attr.column_name()) {
                    attrs.push(attr);
                }
            }
            pending.extend(self.models[child.0].sti_children.iter().copied());
        }
        attrs
    }

    /// A model's primary key, inherited from the root for inheritance
    /// children. Present on every persisted model after resolution.
    pub fn primary_key(&self, id: ModelId) -> Option<&Attribute> {
        let root = self.sti_root(id);
        self.models[root.0].primary_key()
    }

    /// Look a relation up by name, falling back to inherited relations.
    pub fn relation(&self, id: ModelId, name: &str) -> Option<&Relation> {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if let Some(rel) = self.models[c.0].relation(name) {
                return Some(rel);
            }
            cur = self.models[c.0].parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_attributes_cover_the_whole_tree() {
        let mut registry = Registry::new();
        registry.define(ModelDef::new("Content").attr(Attribute::new("title", AttrType::Text)));
        registry.define(
            ModelDef::new("Article")
                .extends("Content")
                .attr(Attribute::new("body", AttrType::Text)),
        );
        registry.define(
            ModelDef::new("Photo")
                .extends("Content")
                .attr(Attribute::new("width", AttrType::Int)),
        );
        let schema = registry.resolve(Dialect::Sqlite).unwrap();

        let content = schema.model_by_name("Content").unwrap().id;
        let columns: Vec<_> = schema
            .table_attributes(content)
            .iter()
            .map(|a| a.name.clone())
            .collect();
        assert_eq!(columns, vec!["id", "model_type", "title", "width", "body"]);

        // Same table columns whichever tree member asks.
        let article = schema.model_by_name("Article").unwrap().id;
        assert_eq!(schema.table_attributes(article).len(), columns.len());
    }

    #[test]
    fn relations_are_inherited() {
        let mut registry = Registry::new();
        registry.define(ModelDef::new("User"));
        registry.define(ModelDef::new("Content").belongs_to("User"));
        registry.define(ModelDef::new("Article").extends("Content"));
        let schema = registry.resolve(Dialect::Sqlite).unwrap();

        let article = schema.model_by_name("Article").unwrap().id;
        let rel = schema.relation(article, "user").unwrap();
        assert_eq!(rel.foreign_key(), "user_id");
        assert!(schema.relation(article, "nope").is_none());
    }
}
