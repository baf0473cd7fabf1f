/// How schema evolution reacts to drift between declared attributes and
/// live table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvolveMode {
    /// Never inspect live tables.
    Off,

    /// Report drift, change nothing.
    #[default]
    Warn,

    /// Apply additions; report removals only.
    AddOnly,

    /// Apply additions, then removals.
    Full,
}

/// The drift between a model's declared columns and a live table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaDiff {
    /// Declared columns missing from the live table.
    pub added: Vec<String>,

    /// Live columns no longer declared.
    pub removed: Vec<String>,
}

impl SchemaDiff {
    /// Compares by column name only; type changes are not detected.
    pub fn from(declared: &[String], live: &[String]) -> Self {
        let added = declared
            .iter()
            .filter(|col| !live.contains(col))
            .cloned()
            .collect();
        let removed = live
            .iter()
            .filter(|col| !declared.contains(col))
            .cloned()
            .collect();
        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
