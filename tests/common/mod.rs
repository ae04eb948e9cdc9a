//! Helpers shared by the integration tests.
#![allow(dead_code)]

use dbexec::config::DbConfig;
use dbexec::core::db::{Cursor, DriverResult, Response, Row, Session, SqliteDriver};
use tempfile::TempDir;

/// A SQLite database file with a seeded `users` table, removed with its directory.
pub struct TestDb {
    _dir: TempDir,
    pub config: DbConfig,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
             INSERT INTO users (id, name) VALUES (1, 'a'), (2, 'b');",
        )
        .unwrap();
        let config = DbConfig::new("localhost", path.to_string_lossy(), "app", "secret").unwrap();
        TestDb { _dir: dir, config }
    }

    pub fn session(&self) -> Session<SqliteDriver> {
        Session::sqlite(self.config.clone())
    }

    pub fn count(&self) -> i64 {
        rusqlite::Connection::open(&self.config.database)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap()
    }
}

/// A cursor over canned result sets.
pub struct VecCursor {
    sets: Vec<Vec<Row>>,
    set: usize,
    row: usize,
}

impl VecCursor {
    pub fn new(sets: Vec<Vec<Row>>) -> Self {
        VecCursor { sets, set: 0, row: 0 }
    }
}

impl Cursor for VecCursor {
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
        -1
    }
}

/// Asserts the success invariant of a response.
pub fn assert_success(response: &Response, context: &str) {
    assert!(response.is_success(), "Expected success in {}: {:?}", context, response.error());
    assert!(response.error().is_none(), "Successful response carries errors in {}", context);
}

/// Asserts the failure invariant of a response.
pub fn assert_failure(response: &Response, context: &str) {
    assert!(!response.is_success(), "Expected failure in {}", context);
    assert!(response.result().is_none(), "Failed response carries a result in {}", context);
    assert!(
        response.error().map_or(false, |e| !e.is_empty()),
        "Failed response has no errors in {}",
        context
    );
}
