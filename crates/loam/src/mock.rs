//! An in-memory backend for tests: records every statement, keeps a
//! table/column registry fed by the DDL it receives, and plays back
//! scripted result rows.

use loam_core::driver::{Connection, Dialect, Driver, Rows};
use loam_core::{async_trait, Error, Result};

use indexmap::IndexMap;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    tables: IndexMap<String, Vec<String>>,
    scripted: VecDeque<Rows>,
    log: Vec<String>,
    last_insert_id: i64,
    fail_on: Vec<(String, bool)>,
    connects: usize,
}

/// A driver whose connections all share one statement log and table
/// registry.
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<State>>,
    dialect: Dialect,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self::with_dialect(Dialect::Sqlite)
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            dialect,
        }
    }

    /// Queue a result set; each `query` consumes one. An empty queue
    /// answers with no rows.
    pub fn script_rows(&self, rows: Rows) {
        self.lock().scripted.push_back(rows);
    }

    /// Make any statement containing `fragment` fail. With `table_exists`
    /// the failure reports an already-existing table.
    pub fn fail_on(&self, fragment: &str, table_exists: bool) {
        self.lock().fail_on.push((fragment.to_string(), table_exists));
    }

    /// Pre-register a table with the given live columns, as if it
    /// predated this process.
    pub fn seed_table(&self, table: &str, columns: &[&str]) {
        self.lock().tables.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
    }

    /// Every statement executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    /// How many connections this driver has opened.
    pub fn connections(&self) -> usize {
        self.lock().connects
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        self.lock().connects += 1;
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
        }))
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }
}

#[derive(Debug)]
struct MockConnection {
    state: Arc<Mutex<State>>,
}

impl MockConnection {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn check_fail(state: &State, sql: &str) -> Result<()> {
        for (fragment, table_exists) in &state.fail_on {
            if sql.contains(fragment.as_str()) {
                return Err(if *table_exists {
                    Error::table_exists(format!("scripted failure: {fragment}"))
                } else {
                    Error::backend(format!("scripted failure: {fragment}"))
                });
            }
        }
        Ok(())
    }
}

fn strip_ident(token: &str) -> String {
    token.trim_matches(|c| c == '"' || c == '`').to_string()
}

/// Column names out of a `CREATE TABLE t (...)` body: the first token of
/// each comma-separated definition.
fn parse_columns(body: &str) -> Vec<String> {
    body.split(", ")
        .filter_map(|def| def.split_whitespace().next())
        .map(strip_ident)
        .collect()
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&mut self, sql: &str) -> Result<Rows> {
        let mut state = self.lock();
        state.log.push(sql.to_string());
        Self::check_fail(&state, sql)?;
        Ok(state.scripted.pop_front().unwrap_or_default())
    }

    async fn exec(&mut self, sql: &str) -> Result<u64> {
        let mut state = self.lock();
        state.log.push(sql.to_string());
        Self::check_fail(&state, sql)?;

        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            if let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) {
                let table = rest[..open].trim().to_string();
                if state.tables.contains_key(&table) {
                    return Err(Error::table_exists(format!("table `{table}` exists")));
                }
                let columns = parse_columns(&rest[open + 1..close]);
                state.tables.insert(table, columns);
            }
        } else if let Some(rest) = sql.strip_prefix("ALTER TABLE ") {
            if let Some((table, action)) = rest.split_once(" ADD COLUMN ") {
                if let Some(column) = action.split_whitespace().next() {
                    let column = strip_ident(column);
                    if let Some(columns) = state.tables.get_mut(table.trim()) {
                        columns.push(column);
                    }
                }
            } else if let Some((table, column)) = rest.split_once(" DROP COLUMN ") {
                let column = strip_ident(column.trim());
                if let Some(columns) = state.tables.get_mut(table.trim()) {
                    columns.retain(|c| *c != column);
                }
            }
        } else if let Some(table) = sql.strip_prefix("DROP TABLE ") {
            state.tables.shift_remove(table.trim());
        }

        Ok(1)
    }

    async fn last_insert_id(&mut self) -> Result<i64> {
        let mut state = self.lock();
        state.last_insert_id += 1;
        Ok(state.last_insert_id)
    }

    async fn begin(&mut self) -> Result<()> {
        self.lock().log.push("BEGIN".to_string());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.lock().log.push("COMMIT".to_string());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.lock().log.push("ROLLBACK".to_string());
        Ok(())
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        let state = self.lock();
        state
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| Error::backend(format!("no such table: {table}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn tracks_created_tables() {
        let driver = MockDriver::new();
        let mut conn = driver.connect().await.unwrap();

        conn.exec("CREATE TABLE t (\"id\" integer PRIMARY KEY AUTOINCREMENT, \"name\" text)")
            .await
            .unwrap();
        assert_eq!(conn.table_columns("t").await.unwrap(), vec!["id", "name"]);

        conn.exec("ALTER TABLE t ADD COLUMN \"age\" integer")
            .await
            .unwrap();
        conn.exec("ALTER TABLE t DROP COLUMN name").await.unwrap();
        assert_eq!(conn.table_columns("t").await.unwrap(), vec!["id", "age"]);
    }

    #[tokio::test]
    async fn repeated_create_reports_existing_table() {
        let driver = MockDriver::new();
        let mut conn = driver.connect().await.unwrap();

        conn.exec("CREATE TABLE t (\"id\" integer)").await.unwrap();
        let err = conn.exec("CREATE TABLE t (\"id\" integer)").await.unwrap_err();
        assert!(err.is_table_exists());
    }

    #[tokio::test]
    async fn scripted_rows_play_back_in_order() {
        use loam_core::stmt::Value;

        let driver = MockDriver::new();
        driver.script_rows(Rows::new(vec!["n".into()], vec![vec![Value::I64(1)]]));

        let mut conn = driver.connect().await.unwrap();
        let rows = conn.query("SELECT n FROM t").await.unwrap();
        assert_eq!(rows.first_value(), Some(&Value::I64(1)));
        assert!(conn.query("SELECT n FROM t").await.unwrap().is_empty());
        assert_eq!(driver.statements().len(), 2);
    }
}
