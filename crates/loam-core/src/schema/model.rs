use super::{Attribute, Capability, Name, Relation};

use std::fmt;
use std::sync::Arc;

/// Uniquely identifies a model within one registry/schema.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ModelId(pub usize);

impl ModelId {
    pub(crate) const fn placeholder() -> Self {
        Self(usize::MAX)
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "ModelId({})", self.0)
    }
}

/// Polymorphic role of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polymorphic {
    No,

    /// A shared placeholder: never persisted directly, specialized per
    /// owner. `relation` names the placeholder relation that gets
    /// retargeted in each specialization.
    Parent { relation: String },

    /// A specialization synthesized under an owner's namespace.
    Child,
}

/// A model descriptor: declared attributes, relations, inheritance and
/// capabilities.
///
/// Mutated while declarations and resolution passes accumulate; frozen
/// ("enchanted") once the schema is built and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Model {
    pub id: ModelId,

    pub name: Name,

    /// Attributes declared on this model itself. For single-table
    /// inheritance children this excludes inherited attributes; see
    /// [`super::Schema::effective_attributes`].
    pub attributes: Vec<Attribute>,

    pub relations: Vec<Relation>,

    /// Explicit table-name override.
    pub table_override: Option<String>,

    /// Single-table-inheritance parent, by name until resolution.
    pub(crate) extends: Option<String>,

    /// Resolved single-table-inheritance parent.
    pub parent: Option<ModelId>,

    /// Direct single-table-inheritance children, filled at resolution.
    pub sti_children: Vec<ModelId>,

    pub polymorphic: Polymorphic,

    pub capabilities: Vec<Arc<dyn Capability>>,

    /// Physical table, computed at enchantment. Empty for polymorphic
    /// parents, which are never persisted.
    pub table: String,
}

impl Model {
    pub(crate) fn new(name: Name) -> Self {
        Self {
            id: ModelId::placeholder(),
            name,
            attributes: vec![],
            relations: vec![],
            table_override: None,
            extends: None,
            parent: None,
            sti_children: vec![],
            polymorphic: Polymorphic::No,
            capabilities: vec![],
            table: String::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The primary key attribute declared on this model itself, if any.
    /// Single-table-inheritance children inherit the root's key.
    pub fn primary_key(&self) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.primary_key)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name.as_deref() == Some(name))
    }

    pub fn is_sti_child(&self) -> bool {
        self.parent.is_some()
    }

    pub fn is_sti_root(&self) -> bool {
        !self.sti_children.is_empty() && self.parent.is_none()
    }

    /// True when the model participates in a single-table-inheritance tree
    /// (and therefore carries a discriminator column).
    pub fn in_sti_tree(&self) -> bool {
        self.parent.is_some() || !self.sti_children.is_empty()
    }

    pub fn is_polymorphic_parent(&self) -> bool {
        matches!(self.polymorphic, Polymorphic::Parent { .. })
    }
}
