use heck::ToSnakeCase;

/// A namespaced type name, e.g. `Article::Comment`.
///
/// Polymorphic expansion synthesizes specialized subtypes scoped under the
/// owner's namespace, so names carry their full path.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Name {
    pub parts: Vec<String>,
}

impl Name {
    pub fn new(src: &str) -> Self {
        let parts = src.split("::").map(String::from).collect();
        Self { parts }
    }

    /// The full name with `::` separators.
    pub fn full(&self) -> String {
        self.parts.join("::")
    }

    /// The demodulized (last) part of the name.
    pub fn last(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    /// The flattened, underscored form of the full name.
    pub fn snake_case(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.to_snake_case())
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The underscored form of the last part only.
    pub fn last_snake(&self) -> String {
        self.last().to_snake_case()
    }

    /// A name nested one level under this one.
    pub fn nested(&self, child: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.push(child.to_string());
        Self { parts }
    }

    /// Candidate full names for resolving `target` relative to this name:
    /// first nested under the full namespace, then walking outward, and
    /// finally the bare target.
    pub fn lookup_candidates(&self, target: &str) -> Vec<String> {
        let mut candidates = Vec::with_capacity(self.parts.len() + 1);
        for depth in (0..=self.parts.len()).rev() {
            let mut parts: Vec<&str> = self.parts[..depth].iter().map(String::as_str).collect();
            parts.push(target);
            candidates.push(parts.join("::"));
        }
        candidates
    }
}

/// Pluralize an underscored word.
pub fn plural(word: &str) -> String {
    pluralizer::pluralize(word, 2, false)
}

/// Singularize an underscored word.
pub fn singular(word: &str) -> String {
    pluralizer::pluralize(word, 1, false)
}
