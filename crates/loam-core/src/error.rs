use std::fmt;

/// An error that can occur in Loam.
pub struct Error {
    kind: ErrorKind,
}

#[derive(Debug)]
pub enum ErrorKind {
    /// The declared object model is inconsistent: an unresolved relation
    /// target, an unknown `include` name, a relation name collision. Always
    /// fatal at setup or compile time.
    Configuration(String),

    /// The backend driver failed. Carries the statement that was being
    /// executed when the failure happened, if any.
    Backend {
        message: String,
        statement: Option<String>,
        /// Set by drivers when the failure is a "table already exists"
        /// signal, which schema creation treats as non-fatal.
        table_exists: bool,
    },

    /// A stale in-memory instance was reloaded after its row was removed.
    Deleted(String),

    /// A validation hook rejected the instance before any SQL was issued.
    Validation(String),

    /// The connection pool failed to produce a connection.
    Pool(String),

    /// A value could not be converted to the requested type.
    TypeConversion { value: String, target: &'static str },

    /// Catch-all bridge for foreign errors.
    Other(anyhow::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        ErrorKind::Configuration(msg.into()).into()
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        ErrorKind::Backend {
            message: msg.into(),
            statement: None,
            table_exists: false,
        }
        .into()
    }

    pub fn table_exists(msg: impl Into<String>) -> Self {
        ErrorKind::Backend {
            message: msg.into(),
            statement: None,
            table_exists: true,
        }
        .into()
    }

    pub fn deleted(msg: impl Into<String>) -> Self {
        ErrorKind::Deleted(msg.into()).into()
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ErrorKind::Validation(msg.into()).into()
    }

    pub fn pool(err: impl fmt::Display) -> Self {
        ErrorKind::Pool(err.to_string()).into()
    }

    pub fn type_conversion(value: impl fmt::Debug, target: &'static str) -> Self {
        ErrorKind::TypeConversion {
            value: format!("{value:?}"),
            target,
        }
        .into()
    }

    /// Attaches the failing statement to a backend error. Leaves other
    /// error kinds untouched.
    pub fn with_statement(mut self, stmt: impl Into<String>) -> Self {
        if let ErrorKind::Backend { statement, .. } = &mut self.kind {
            *statement = Some(stmt.into());
        }
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, ErrorKind::Configuration(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.kind, ErrorKind::Deleted(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
    }

    pub fn is_backend(&self) -> bool {
        matches!(self.kind, ErrorKind::Backend { .. })
    }

    /// True when the backend reported a "table already exists" condition.
    pub fn is_table_exists(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Backend {
                table_exists: true,
                ..
            }
        )
    }

    pub fn statement(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Backend { statement, .. } => statement.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Configuration(msg) => write!(f, "configuration error: {msg}"),
            ErrorKind::Backend {
                message,
                statement: Some(stmt),
                ..
            } => write!(f, "backend error: {message} [{stmt}]"),
            ErrorKind::Backend { message, .. } => write!(f, "backend error: {message}"),
            ErrorKind::Deleted(msg) => write!(f, "no longer exists: {msg}"),
            ErrorKind::Validation(msg) => write!(f, "validation failed: {msg}"),
            ErrorKind::Pool(msg) => write!(f, "connection pool error: {msg}"),
            ErrorKind::TypeConversion { value, target } => {
                write!(f, "cannot convert {value} to {target}")
            }
            ErrorKind::Other(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.debug_struct("Error").field("kind", &self.kind).finish()
        } else {
            fmt::Display::fmt(self, f)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        ErrorKind::Other(err).into()
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::from(anyhow::Error::from(err))
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Self::from(anyhow::Error::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_carries_statement() {
        let err = Error::backend("syntax error").with_statement("SELECT * FROM nope");
        assert_eq!(
            err.to_string(),
            "backend error: syntax error [SELECT * FROM nope]"
        );
        assert_eq!(err.statement(), Some("SELECT * FROM nope"));
    }

    #[test]
    fn table_exists_flag() {
        let err = Error::table_exists("table loam_user already exists");
        assert!(err.is_table_exists());
        assert!(err.is_backend());
        assert!(!Error::backend("boom").is_table_exists());
    }

    #[test]
    fn with_statement_ignores_non_backend_kinds() {
        let err = Error::deleted("User[3]").with_statement("SELECT 1");
        assert_eq!(err.statement(), None);
        assert!(err.is_deleted());
    }

    #[test]
    fn display_kinds() {
        assert_eq!(
            Error::configuration("bad target").to_string(),
            "configuration error: bad target"
        );
        assert_eq!(
            Error::deleted("User[1]").to_string(),
            "no longer exists: User[1]"
        );
        assert_eq!(
            Error::validation("name is required").to_string(),
            "validation failed: name is required"
        );
    }
}
