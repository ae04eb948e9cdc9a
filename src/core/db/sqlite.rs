/// SQLite Driver Module
///
/// A [`Driver`] backed by rusqlite. The `database` connection parameter is
/// the database file path (or `:memory:`); host and credentials are recorded
/// in the server metadata but otherwise unused by SQLite.
///
/// A SQL text may contain several `;`-separated statements. Each statement
/// produces one result set, empty for statements that return no columns, so
/// `INSERT ...; SELECT ...` yields two sets in order.
use super::driver::{
    ClientInfo, ConnectParams, Cursor, Driver, DriverError, DriverResult, ServerInfo,
};
use super::value::{Row, Value};
use rusqlite::{params, params_from_iter, Batch, Connection, OpenFlags, Params, Statement};
use std::time::Duration;
use tracing::{debug, error};

/// Option key selecting a read-only connection.
pub const OPT_READ_ONLY: &str = "ReadOnly";
/// Option key for the busy timeout in milliseconds.
pub const OPT_BUSY_TIMEOUT: &str = "BusyTimeout";
/// Option key toggling foreign key enforcement.
pub const OPT_FOREIGN_KEYS: &str = "ForeignKeys";
/// Option key for the client character set. Only UTF-8 is supported.
pub const OPT_CHARACTER_SET: &str = "CharacterSet";

/// An open SQLite connection together with the parameters it was opened with.
#[derive(Debug)]
pub struct SqliteHandle {
    conn: Connection,
    host: String,
    database: String,
}

impl SqliteHandle {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// A statement whose syntax and parameter count have been checked.
///
/// Only the SQL text and the bound values are kept. The compiled statement
/// stays in the connection's statement cache, so executing it finds the
/// statement already prepared.
#[derive(Debug, Clone)]
pub struct SqlitePrepared {
    sql: String,
    params: Vec<Value>,
}

/// Fully materialized result sets of one executed SQL text.
#[derive(Debug, Clone, Default)]
pub struct SqliteCursor {
    sets: Vec<Vec<Row>>,
    set: usize,
    row: usize,
    rows_affected: i64,
}

impl Cursor for SqliteCursor {
    fn fetch_row(&mut self) -> DriverResult<Option<Row>> {
        let next = self
            .sets
            .get(self.set)
            .and_then(|rows| rows.get(self.row))
            .cloned();
        if next.is_some() {
            self.row += 1;
        }
        Ok(next)
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

/// The rusqlite-backed driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        SqliteDriver
    }
}

impl Driver for SqliteDriver {
    type Handle = SqliteHandle;
    type Prepared = SqlitePrepared;
    type Cursor = SqliteCursor;

    fn connect(&mut self, params: &ConnectParams<'_>) -> DriverResult<SqliteHandle> {
        if let Some(charset) = params.options.get(OPT_CHARACTER_SET).and_then(|v| v.as_str()) {
            if !charset.eq_ignore_ascii_case("UTF-8") && !charset.eq_ignore_ascii_case("UTF8") {
                return Err(vec![DriverError::new(format!(
                    "Unsupported character set '{}'",
                    charset
                ))]);
            }
        }

        let read_only = params
            .options
            .get(OPT_READ_ONLY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let flags = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };

        debug!("Opening SQLite database {} (read_only = {})", params.database, read_only);
        let conn = Connection::open_with_flags(params.database, flags).map_err(driver_errors)?;

        if let Some(ms) = params.options.get(OPT_BUSY_TIMEOUT).and_then(|v| v.as_u64()) {
            conn.busy_timeout(Duration::from_millis(ms)).map_err(driver_errors)?;
        }
        if let Some(on) = params.options.get(OPT_FOREIGN_KEYS).and_then(|v| v.as_bool()) {
            let pragma = if on { "PRAGMA foreign_keys = ON" } else { "PRAGMA foreign_keys = OFF" };
            conn.execute_batch(pragma).map_err(driver_errors)?;
        }

        Ok(SqliteHandle {
            conn,
            host: params.host.to_string(),
            database: params.database.to_string(),
        })
    }

    fn server_info(&self, handle: &SqliteHandle) -> ServerInfo {
        ServerInfo {
            host: handle.host.clone(),
            database: handle.database.clone(),
            version: rusqlite::version().to_string(),
        }
    }

    fn client_info(&self, _handle: &SqliteHandle) -> ClientInfo {
        ClientInfo {
            driver: "rusqlite".to_string(),
            version: rusqlite::version().to_string(),
        }
    }

    fn close(&mut self, handle: SqliteHandle) -> Result<(), (SqliteHandle, Vec<DriverError>)> {
        let SqliteHandle { conn, host, database } = handle;
        conn.close().map_err(|(conn, e)| {
            error!("Failed to close SQLite connection: {}", e);
            (SqliteHandle { conn, host, database }, driver_errors(e))
        })
    }

    fn execute(&mut self, handle: &mut SqliteHandle, sql: &str) -> DriverResult<SqliteCursor> {
        run_batch(&handle.conn, sql).map_err(driver_errors)
    }

    fn prepare_and_bind(
        &mut self,
        handle: &mut SqliteHandle,
        sql: &str,
        params: &[Value],
    ) -> DriverResult<SqlitePrepared> {
        let stmt = handle.conn.prepare_cached(sql).map_err(driver_errors)?;
        let expected = stmt.parameter_count();
        if expected != params.len() {
            return Err(vec![DriverError::new(format!(
                "Wrong number of parameters: expected {}, got {}",
                expected,
                params.len()
            ))]);
        }
        Ok(SqlitePrepared {
            sql: sql.to_string(),
            params: params.to_vec(),
        })
    }

    fn execute_prepared(
        &mut self,
        handle: &mut SqliteHandle,
        prepared: SqlitePrepared,
    ) -> DriverResult<SqliteCursor> {
        let conn = &handle.conn;
        let mut stmt = conn.prepare_cached(&prepared.sql).map_err(driver_errors)?;
        let (set, rows_affected) =
            run_statement(conn, &mut stmt, params_from_iter(prepared.params.iter())).map_err(driver_errors)?;
        Ok(SqliteCursor {
            sets: vec![set],
            rows_affected,
            ..SqliteCursor::default()
        })
    }

    fn begin_transaction(&mut self, handle: &mut SqliteHandle) -> DriverResult<()> {
        handle.conn.execute_batch("BEGIN").map_err(driver_errors)
    }

    fn commit(&mut self, handle: &mut SqliteHandle) -> DriverResult<()> {
        handle.conn.execute_batch("COMMIT").map_err(driver_errors)
    }

    fn rollback(&mut self, handle: &mut SqliteHandle) -> DriverResult<()> {
        handle.conn.execute_batch("ROLLBACK").map_err(driver_errors)
    }
}

/// Runs every statement of `sql` in order, one result set per statement.
fn run_batch(conn: &Connection, sql: &str) -> rusqlite::Result<SqliteCursor> {
    let mut sets = Vec::new();
    let mut rows_affected = -1;
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next()? {
        let (set, affected) = run_statement(conn, &mut stmt, params![])?;
        sets.push(set);
        rows_affected = affected;
    }
    if sets.is_empty() {
        sets.push(Vec::new());
    }
    Ok(SqliteCursor {
        sets,
        rows_affected,
        ..SqliteCursor::default()
    })
}

fn run_statement<P: Params>(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    params: P,
) -> rusqlite::Result<(Vec<Row>, i64)> {
    if stmt.column_count() == 0 {
        // sqlite3_changes() keeps the count of the last DML statement, so a
        // DDL statement on a reused connection would report stale changes.
        let before = total_changes(conn)?;
        let changes = stmt.execute(params)? as i64;
        let modified = is_dml(stmt) || total_changes(conn)? != before;
        return Ok((Vec::new(), if modified { changes } else { -1 }));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let readonly = stmt.readonly();
    let mut set = Vec::new();
    let mut rows = stmt.query(params)?;
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (i, name) in columns.iter().enumerate() {
            record.push(name.clone(), Value::from(row.get_ref(i)?));
        }
        set.push(record);
    }
    drop(rows);

    let affected = if readonly { -1 } else { conn.changes() as i64 };
    Ok((set, affected))
}

fn total_changes(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT total_changes()", [], |row| row.get(0))
}

/// Whether the statement is an INSERT, UPDATE, DELETE or REPLACE, possibly
/// behind a `WITH` clause.
fn is_dml(stmt: &Statement<'_>) -> bool {
    const DML: [&str; 4] = ["INSERT", "UPDATE", "DELETE", "REPLACE"];
    let Some(sql) = stmt.expanded_sql() else {
        return false;
    };
    let mut words = sql
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_uppercase);
    match words.next() {
        Some(first) if first == "WITH" => words.any(|w| DML.contains(&w.as_str())),
        Some(first) => DML.contains(&first.as_str()),
        None => false,
    }
}

fn driver_errors(err: rusqlite::Error) -> Vec<DriverError> {
    let record = match &err {
        rusqlite::Error::SqliteFailure(code, message) => {
            let text = message.clone().unwrap_or_else(|| code.to_string());
            DriverError::new(text)
                .with_code(code.extended_code)
                .with_state(format!("{:?}", code.code))
        }
        other => DriverError::new(other.to_string()),
    };
    vec![record]
}
