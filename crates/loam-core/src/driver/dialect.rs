use crate::schema::AttrType;
use crate::stmt::Value;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// The differences between SQL backends that the mapper and compiler care
/// about: the semantic-type → column-type table, literal quoting and
/// escaping, identifier quoting, and identifier length limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgresql,
    Mysql,
}

impl Dialect {
    /// The column type token for a semantic attribute type. Overridable per
    /// attribute via its `sql_type` annotation.
    pub fn type_token(&self, ty: AttrType) -> &'static str {
        use AttrType::*;

        match (self, ty) {
            (_, Int) => "integer",
            (Self::Sqlite, BigInt) => "integer",
            (_, BigInt) => "bigint",
            (Self::Postgresql, Float) => "double precision",
            (_, Float) => "float",
            (_, Text) => "text",
            (Self::Mysql, Timestamp) => "datetime",
            (_, Timestamp) => "timestamp",
            (_, Date) => "date",
            (Self::Mysql, Bool) => "tinyint(1)",
            (_, Bool) => "boolean",
            (Self::Postgresql, Blob) => "bytea",
            (_, Blob) => "blob",
        }
    }

    /// Full column SQL for the auto-generated integer primary key.
    pub fn auto_primary_key(&self) -> &'static str {
        match self {
            Self::Sqlite => "integer PRIMARY KEY AUTOINCREMENT",
            Self::Postgresql => "bigserial PRIMARY KEY",
            Self::Mysql => "bigint AUTO_INCREMENT PRIMARY KEY",
        }
    }

    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::Mysql => format!("`{ident}`"),
            _ => format!("\"{ident}\""),
        }
    }

    /// Escape a string for embedding in a single-quoted SQL literal.
    pub fn escape(&self, src: &str) -> String {
        match self {
            // MySQL treats backslash as an escape character inside literals.
            Self::Mysql => src.replace('\\', "\\\\").replace('\'', "''"),
            _ => src.replace('\'', "''"),
        }
    }

    /// Render a value as a SQL literal.
    pub fn quote(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::I64(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::Bool(v) => match self {
                Self::Mysql => if *v { "1" } else { "0" }.to_string(),
                _ => if *v { "'t'" } else { "'f'" }.to_string(),
            },
            Value::String(v) | Value::Timestamp(v) => format!("'{}'", self.escape(v)),
            Value::List(items) => self.quote_list(items),
        }
    }

    /// Render a list of values as a comma-separated run of literals, for
    /// `IN (...)` and list-expansion placeholders.
    pub fn quote_list(&self, items: &[Value]) -> String {
        items
            .iter()
            .map(|v| self.quote(v))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn max_identifier_len(&self) -> usize {
        match self {
            Self::Postgresql => 63,
            Self::Mysql => 64,
            Self::Sqlite => 512,
        }
    }

    /// Shortens an identifier that exceeds the dialect limit, keeping a
    /// deterministic hash suffix so distinct long names stay distinct.
    pub fn fit_identifier(&self, ident: String) -> String {
        let max = self.max_identifier_len();
        if ident.len() <= max {
            return ident;
        }

        let mut hasher = DefaultHasher::new();
        ident.hash(&mut hasher);
        let suffix = format!("_{:08x}", hasher.finish() as u32);
        let keep = max - suffix.len();
        format!("{}{}", &ident[..keep], suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_literals() {
        let d = Dialect::Sqlite;
        assert_eq!(d.quote(&Value::I64(10)), "10");
        assert_eq!(d.quote(&Value::Null), "NULL");
        assert_eq!(d.quote(&Value::Bool(true)), "'t'");
        assert_eq!(d.quote(&"o'brien".into()), "'o''brien'");
    }

    #[test]
    fn mysql_booleans_are_numeric() {
        assert_eq!(Dialect::Mysql.quote(&Value::Bool(false)), "0");
    }

    #[test]
    fn quote_list_joins_literals() {
        let d = Dialect::Postgresql;
        let items = vec![Value::I64(1), Value::I64(2), "a".into()];
        assert_eq!(d.quote_list(&items), "1,2,'a'");
    }

    #[test]
    fn fit_identifier_truncates_deterministically() {
        let d = Dialect::Postgresql;
        let long = "x".repeat(100);
        let a = d.fit_identifier(long.clone());
        let b = d.fit_identifier(long.clone());
        assert_eq!(a, b);
        assert_eq!(a.len(), d.max_identifier_len());

        let other = d.fit_identifier(format!("{long}y"));
        assert_ne!(a, other);

        let short = d.fit_identifier("users".to_string());
        assert_eq!(short, "users");
    }
}
