use crate::stmt::Value;

/// Semantic attribute types. Each maps to a per-dialect column type token,
/// overridable per attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Int,
    BigInt,
    Float,
    Text,
    Bool,
    Timestamp,
    Date,
    Blob,
}

/// A declared attribute: name, semantic type, and the annotations that
/// control its SQL mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,

    pub ty: AttrType,

    /// This attribute is the model's primary key.
    pub primary_key: bool,

    /// Auto-generated integer key; set on the implicit primary key.
    pub auto_increment: bool,

    /// Overrides the column name.
    pub column: Option<String>,

    /// Raw column SQL; replaces the generated type and clauses entirely.
    pub sql: Option<String>,

    /// Overrides the column type token only.
    pub sql_type: Option<String>,

    pub index: bool,

    pub unique: bool,

    pub default: Option<Value>,

    pub not_null: bool,

    /// Appended after the generated clauses.
    pub extra_sql: Option<String>,
}

impl Attribute {
    pub fn new(name: &str, ty: AttrType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            primary_key: false,
            auto_increment: false,
            column: None,
            sql: None,
            sql_type: None,
            index: false,
            unique: false,
            default: None,
            not_null: false,
            extra_sql: None,
        }
    }

    /// The implicit auto-generated integer primary key, forced onto models
    /// that declare no explicit key.
    pub(crate) fn auto_id(name: &str) -> Self {
        let mut attr = Self::new(name, AttrType::BigInt);
        attr.primary_key = true;
        attr.auto_increment = true;
        attr
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    pub fn sql(mut self, sql: &str) -> Self {
        self.sql = Some(sql.to_string());
        self
    }

    pub fn sql_type(mut self, sql_type: &str) -> Self {
        self.sql_type = Some(sql_type.to_string());
        self
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn extra_sql(mut self, extra: &str) -> Self {
        self.extra_sql = Some(extra.to_string());
        self
    }

    /// The column this attribute maps to: the `column` annotation when
    /// present, the attribute name otherwise.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_name_override() {
        let attr = Attribute::new("body", AttrType::Text);
        assert_eq!(attr.column_name(), "body");

        let attr = Attribute::new("body", AttrType::Text).column("content");
        assert_eq!(attr.column_name(), "content");
    }

    #[test]
    fn auto_id_shape() {
        let attr = Attribute::auto_id("id");
        assert!(attr.primary_key);
        assert!(attr.auto_increment);
        assert_eq!(attr.ty, AttrType::BigInt);
    }
}
