use super::ModelId;

/// The kinds of declared relation.
///
/// `RefersTo` and `BelongsTo` both store a foreign key on the owner; they
/// differ in lifecycle coupling: deleting the target of a `BelongsTo`
/// cascades to the owners, deleting the target of a `RefersTo` leaves them
/// untouched. `HasMany` is the reverse-collection side of a `BelongsTo`.
/// `JoinsMany` goes through a join table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    RefersTo,
    BelongsTo,
    HasMany,
    JoinsMany,
}

/// A relation target: symbolic until the resolution passes run, concrete
/// afterwards. Every target must be `Resolved` before enchantment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Symbolic(String),
    Resolved(ModelId),
}

impl TargetRef {
    pub fn resolved(&self) -> Option<ModelId> {
        match self {
            Self::Resolved(id) => Some(*id),
            Self::Symbolic(_) => None,
        }
    }

    /// The concrete target. Relations are only read after resolution, where
    /// a symbolic target would violate the schema invariant.
    pub fn expect_resolved(&self) -> ModelId {
        match self {
            Self::Resolved(id) => *id,
            Self::Symbolic(name) => panic!("relation target `{name}` was never resolved"),
        }
    }
}

/// Join-table facts for a `JoinsMany` relation, derived deterministically
/// from the canonical ordering of the two participant type names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTableInfo {
    pub table: String,

    /// Key column holding the owner's primary key.
    pub owner_key: String,

    /// Key column holding the target's primary key.
    pub target_key: String,

    /// The two key columns in canonical (lexicographic) order.
    pub first_key: String,
    pub second_key: String,

    pub owner_table: String,
    pub target_table: String,
}

/// A declared relation between two models.
///
/// Mutated only by the resolution passes; read-only once the schema is
/// frozen.
#[derive(Debug, Clone)]
pub struct Relation {
    pub kind: RelationKind,

    /// Model that declared the relation.
    pub owner: ModelId,

    pub target: TargetRef,

    /// Exposed relation name; inferred from the target type name during
    /// name resolution unless explicitly given.
    pub name: Option<String>,

    /// Foreign-key column; derived during enchantment unless given.
    pub foreign_key: Option<String>,

    /// True for `HasMany` and `JoinsMany`.
    pub collection: bool,

    /// Marks the shared-placeholder relation on a polymorphic parent.
    pub polymorphic: bool,

    /// User-defined join type realizing the join table.
    pub through: Option<TargetRef>,

    /// Explicit join-table name override.
    pub table: Option<String>,

    /// Computed during enchantment for `JoinsMany` relations.
    pub join: Option<JoinTableInfo>,
}

impl Relation {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn foreign_key(&self) -> &str {
        self.foreign_key
            .as_deref()
            .expect("relation foreign key not yet derived")
    }

    /// True for the kinds that store a foreign key on the owner.
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, RelationKind::RefersTo | RelationKind::BelongsTo)
    }
}

/// A builder for relation declarations, the structured equivalent of the
/// original declaration macros.
#[derive(Debug, Clone)]
pub struct RelationDef {
    pub(crate) kind: RelationKind,
    pub(crate) target: String,
    pub(crate) name: Option<String>,
    pub(crate) foreign_key: Option<String>,
    pub(crate) table: Option<String>,
    pub(crate) through: Option<String>,
    pub(crate) polymorphic: bool,
}

impl RelationDef {
    fn new(kind: RelationKind, target: &str) -> Self {
        Self {
            kind,
            target: target.to_string(),
            name: None,
            foreign_key: None,
            table: None,
            through: None,
            polymorphic: false,
        }
    }

    pub fn refers_to(target: &str) -> Self {
        Self::new(RelationKind::RefersTo, target)
    }

    /// `has_one` is a reference relation with no lifecycle coupling; an
    /// alias for `refers_to`.
    pub fn has_one(target: &str) -> Self {
        Self::refers_to(target)
    }

    pub fn belongs_to(target: &str) -> Self {
        Self::new(RelationKind::BelongsTo, target)
    }

    pub fn has_many(target: &str) -> Self {
        Self::new(RelationKind::HasMany, target)
    }

    pub fn joins_many(target: &str) -> Self {
        Self::new(RelationKind::JoinsMany, target)
    }

    /// Alias for [`RelationDef::joins_many`].
    pub fn many_to_many(target: &str) -> Self {
        Self::joins_many(target)
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn foreign_key(mut self, key: &str) -> Self {
        self.foreign_key = Some(key.to_string());
        self
    }

    /// Explicit join-table name.
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    /// Realize the join through a user-defined join type, whose table (and
    /// extra attributes) replace the generated join table.
    pub fn through(mut self, through: &str) -> Self {
        self.through = Some(through.to_string());
        self
    }

    /// Mark this relation as the shared polymorphic placeholder; the
    /// declaring model becomes a polymorphic parent, specialized per owner
    /// during resolution.
    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    pub(crate) fn into_relation(self, owner: ModelId) -> Relation {
        let collection = matches!(self.kind, RelationKind::HasMany | RelationKind::JoinsMany);
        Relation {
            kind: self.kind,
            owner,
            target: TargetRef::Symbolic(self.target),
            name: self.name,
            foreign_key: self.foreign_key,
            collection,
            polymorphic: self.polymorphic,
            through: self.through.map(TargetRef::Symbolic),
            table: self.table,
            join: None,
        }
    }
}
