mod dialect;
pub use dialect::Dialect;

use crate::{async_trait, stmt::Value, Result};

use std::fmt::Debug;

/// A result set returned by [`Connection::query`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    /// Column names, in result order.
    pub columns: Vec<String>,

    /// Row values, one `Vec<Value>` per row, positions matching `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl Rows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Position of a named column in the result, if present.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// The first column of the first row. Used by aggregate queries.
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// A live backend session.
///
/// Everything the persistence engine needs from a backend goes through this
/// trait: statement execution, generated-key retrieval, transaction control
/// and live-column introspection. Values travel inside the SQL text itself
/// (quoted through [`Dialect`]), so there is no bind-parameter surface.
#[async_trait]
pub trait Connection: Debug + Send {
    /// Execute a statement that produces rows.
    async fn query(&mut self, sql: &str) -> Result<Rows>;

    /// Execute a statement, returning the affected-row count.
    async fn exec(&mut self, sql: &str) -> Result<u64>;

    /// The key generated by the most recent INSERT on this connection.
    async fn last_insert_id(&mut self) -> Result<i64>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// The live column names of a table, in storage order.
    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>>;
}

/// A backend driver: a factory for [`Connection`]s plus the static facts the
/// engine needs before any connection exists.
#[async_trait]
pub trait Driver: Debug + Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Connection>>;

    /// The SQL dialect spoken by connections of this driver.
    fn dialect(&self) -> Dialect;

    /// Upper bound on concurrently open connections, if the backend imposes
    /// one. `None` lets the pool pick its default.
    fn max_connections(&self) -> Option<usize> {
        None
    }
}
