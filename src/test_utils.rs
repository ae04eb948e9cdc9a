/// # Test Utilities Module
///
/// Testing infrastructure for the unit tests:
/// - A scriptable `MockDriver` that records every driver call and fails on demand
/// - `MockCursor` for feeding canned result sets to the normalizer
/// - `mock_session` for sessions that never touch a database
use crate::config::DbConfig;
use crate::core::db::{
    ClientInfo, ConnectParams, Cursor, Driver, DriverError, DriverResult, Row, ServerInfo, Session, Value,
};
use std::collections::VecDeque;

/// A driver call as seen by [`MockDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Connect,
    Close,
    Execute(String),
    Prepare(String),
    ExecutePrepared(String),
    Begin,
    Commit,
    Rollback,
}

/// Canned result sets, one cursor's worth.
#[derive(Debug, Clone, Default)]
pub struct MockCursor {
    sets: Vec<Vec<Row>>,
    set: usize,
    row: usize,
    rows_affected: i64,
}

impl MockCursor {
    pub fn new(sets: Vec<Vec<Row>>, rows_affected: i64) -> Self {
        let sets = if sets.is_empty() { vec![Vec::new()] } else { sets };
        MockCursor {
            sets,
            set: 0,
            row: 0,
            rows_affected,
        }
    }
}

impl Cursor for MockCursor {
    fn fetch_row(&mut self) -> DriverResult<Option<Row>> {
        let row = self.sets.get(self.set).and_then(|s| s.get(self.row)).cloned();
        if row.is_some() {
            self.row += 1;
        }
        Ok(row)
    }

    fn next_result_set(&mut self) -> DriverResult<bool> {
        if self.set + 1 < self.sets.len() {
            self.set += 1;
            self.row = 0;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn rows_affected(&self) -> i64 {
        self.rows_affected
    }
}

/// A driver that never touches a database.
///
/// Every executed statement returns the next queued result, or an empty set
/// when the queue is empty. Statements registered with [`MockDriver::fail_sql`]
/// fail on execute and on prepare.
#[derive(Debug, Default)]
pub struct MockDriver {
    calls: Vec<MockCall>,
    results: VecDeque<MockCursor>,
    failing: Vec<(String, String)>,
    fail_connect: bool,
    fail_close: bool,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&mut self, sets: Vec<Vec<Row>>, rows_affected: i64) {
        self.results.push_back(MockCursor::new(sets, rows_affected));
    }

    pub fn fail_sql(&mut self, sql: &str, message: &str) {
        self.failing.push((sql.to_string(), message.to_string()));
    }

    pub fn fail_connect(&mut self, fail: bool) {
        self.fail_connect = fail;
    }

    pub fn fail_close(&mut self, fail: bool) {
        self.fail_close = fail;
    }

    pub fn fail_begin(&mut self, fail: bool) {
        self.fail_begin = fail;
    }

    pub fn fail_commit(&mut self, fail: bool) {
        self.fail_commit = fail;
    }

    pub fn fail_rollback(&mut self, fail: bool) {
        self.fail_rollback = fail;
    }

    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    pub fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    /// SQL texts that reached execution, in order.
    pub fn executed(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Execute(sql) | MockCall::ExecutePrepared(sql) => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    fn failure_for(&self, sql: &str) -> Option<Vec<DriverError>> {
        self.failing
            .iter()
            .find(|(s, _)| s == sql)
            .map(|(_, message)| vec![DriverError::new(message.clone()).with_code(1).with_state("42000")])
    }

    fn simulated(flag: bool, what: &str) -> DriverResult<()> {
        if flag {
            Err(vec![DriverError::new(format!("simulated {} failure", what))])
        } else {
            Ok(())
        }
    }
}

impl Driver for MockDriver {
    type Handle = u32;
    type Prepared = String;
    type Cursor = MockCursor;

    fn connect(&mut self, _params: &ConnectParams<'_>) -> DriverResult<u32> {
        self.calls.push(MockCall::Connect);
        Self::simulated(self.fail_connect, "connect")?;
        Ok(self.count(|c| matches!(c, MockCall::Connect)) as u32)
    }

    fn server_info(&self, _handle: &u32) -> ServerInfo {
        ServerInfo {
            host: "mock".to_string(),
            database: "app".to_string(),
            version: "1.0".to_string(),
        }
    }

    fn client_info(&self, _handle: &u32) -> ClientInfo {
        ClientInfo {
            driver: "mock".to_string(),
            version: "1.0".to_string(),
        }
    }

    fn close(&mut self, handle: u32) -> std::result::Result<(), (u32, Vec<DriverError>)> {
        self.calls.push(MockCall::Close);
        Self::simulated(self.fail_close, "close").map_err(|e| (handle, e))
    }

    fn execute(&mut self, _handle: &mut u32, sql: &str) -> DriverResult<MockCursor> {
        self.calls.push(MockCall::Execute(sql.to_string()));
        if let Some(errors) = self.failure_for(sql) {
            return Err(errors);
        }
        Ok(self.results.pop_front().unwrap_or_else(|| MockCursor::new(Vec::new(), -1)))
    }

    fn prepare_and_bind(&mut self, _handle: &mut u32, sql: &str, _params: &[Value]) -> DriverResult<String> {
        self.calls.push(MockCall::Prepare(sql.to_string()));
        match self.failure_for(sql) {
            Some(errors) => Err(errors),
            None => Ok(sql.to_string()),
        }
    }

    fn execute_prepared(&mut self, _handle: &mut u32, prepared: String) -> DriverResult<MockCursor> {
        self.calls.push(MockCall::ExecutePrepared(prepared));
        Ok(self.results.pop_front().unwrap_or_else(|| MockCursor::new(Vec::new(), -1)))
    }

    fn begin_transaction(&mut self, _handle: &mut u32) -> DriverResult<()> {
        self.calls.push(MockCall::Begin);
        Self::simulated(self.fail_begin, "begin")
    }

    fn commit(&mut self, _handle: &mut u32) -> DriverResult<()> {
        self.calls.push(MockCall::Commit);
        Self::simulated(self.fail_commit, "commit")
    }

    fn rollback(&mut self, _handle: &mut u32) -> DriverResult<()> {
        self.calls.push(MockCall::Rollback);
        Self::simulated(self.fail_rollback, "rollback")
    }
}

/// Configuration used by test sessions.
pub fn test_config(database: &str) -> DbConfig {
    DbConfig {
        host: "localhost".to_string(),
        database: database.to_string(),
        user: "tester".to_string(),
        password: "secret".to_string(),
        options: serde_json::Map::new(),
    }
}

/// A session over a fresh [`MockDriver`].
pub fn mock_session() -> Session<MockDriver> {
    Session::new(test_config("app"), MockDriver::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_driver_records_calls() {
        let mut driver = MockDriver::new();
        driver.fail_sql("bad", "boom");
        let options = serde_json::Map::new();
        let params = ConnectParams {
            host: "h",
            database: "d",
            user: "u",
            password: "p",
            options: &options,
        };
        let mut handle = driver.connect(&params).unwrap();
        assert!(driver.execute(&mut handle, "ok").is_ok());
        assert_eq!(driver.execute(&mut handle, "bad").unwrap_err()[0].message, "boom");
        assert_eq!(driver.executed(), vec!["ok".to_string(), "bad".to_string()]);
        assert_eq!(driver.calls()[0], MockCall::Connect);
    }
}
