/// Driver Adapter Module
///
/// The boundary between the command layer and a physical database driver.
/// Everything below this trait (transport, wire protocol, statement
/// compilation) belongs to the driver; everything above it is driver-neutral.
///
/// Every fallible driver call returns its error records in the `Err` arm
/// instead of exposing a separate "last errors" call. The records may contain
/// duplicates; the command layer deduplicates them before use.
use super::value::{Row, Value};
use serde::Serialize;
use serde_json::Map;
use std::fmt;

/// A single driver-level error record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverError {
    pub message: String,
    pub code: Option<i32>,
    pub state: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        DriverError {
            message: message.into(),
            code: None,
            state: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.state, self.code) {
            (Some(state), Some(code)) => write!(f, "[{}:{}] {}", state, code, self.message),
            (Some(state), None) => write!(f, "[{}] {}", state, self.message),
            (None, Some(code)) => write!(f, "[{}] {}", code, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

/// Result of a driver call.
pub type DriverResult<T> = std::result::Result<T, Vec<DriverError>>;

/// Everything a driver needs to open a connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectParams<'a> {
    pub host: &'a str,
    pub database: &'a str,
    pub user: &'a str,
    pub password: &'a str,
    /// Driver options, already merged over the defaults.
    pub options: &'a Map<String, serde_json::Value>,
}

/// Server metadata captured right after a successful connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub host: String,
    pub database: String,
    pub version: String,
}

/// Client library metadata captured right after a successful connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub driver: String,
    pub version: String,
}

/// Forward-only cursor over the result sets of one executed statement.
pub trait Cursor {
    /// Fetches the next row of the current result set, `None` at the end of the set.
    fn fetch_row(&mut self) -> DriverResult<Option<Row>>;

    /// Advances to the next result set. Returns false when there are no more.
    fn next_result_set(&mut self) -> DriverResult<bool>;

    /// Rows affected by the statement, negative when not applicable.
    fn rows_affected(&self) -> i64;
}

/// A blocking database driver.
pub trait Driver {
    /// An open physical connection.
    type Handle;
    /// A prepared statement with its parameters bound, not yet executed.
    type Prepared;
    /// An executed statement.
    type Cursor: Cursor;

    fn connect(&mut self, params: &ConnectParams<'_>) -> DriverResult<Self::Handle>;

    fn server_info(&self, handle: &Self::Handle) -> ServerInfo;

    fn client_info(&self, handle: &Self::Handle) -> ClientInfo;

    /// Closes the connection. On failure the handle is given back.
    fn close(&mut self, handle: Self::Handle) -> std::result::Result<(), (Self::Handle, Vec<DriverError>)>;

    fn execute(&mut self, handle: &mut Self::Handle, sql: &str) -> DriverResult<Self::Cursor>;

    fn prepare_and_bind(
        &mut self,
        handle: &mut Self::Handle,
        sql: &str,
        params: &[Value],
    ) -> DriverResult<Self::Prepared>;

    fn execute_prepared(
        &mut self,
        handle: &mut Self::Handle,
        prepared: Self::Prepared,
    ) -> DriverResult<Self::Cursor>;

    fn begin_transaction(&mut self, handle: &mut Self::Handle) -> DriverResult<()>;

    fn commit(&mut self, handle: &mut Self::Handle) -> DriverResult<()>;

    fn rollback(&mut self, handle: &mut Self::Handle) -> DriverResult<()>;
}

/// Removes repeated error records, keeping the first occurrence of each.
pub fn dedup_errors(errors: Vec<DriverError>) -> Vec<DriverError> {
    let mut seen: Vec<DriverError> = Vec::with_capacity(errors.len());
    for error in errors {
        if !seen.contains(&error) {
            seen.push(error);
        }
    }
    seen
}
