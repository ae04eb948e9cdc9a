/// Session Module
///
/// A `Session` owns one logical connection and everything that hangs off
/// it: the connection lifecycle, the transaction context with its error log,
/// and the debug countdown. It is the entry point for executing statements.
///
/// Ordinary statement and transaction failures never surface as `Err`; they
/// come back as failed [`Response`]s or `false`, with the accumulated
/// messages available from [`Session::errors`].
use super::connection::{ConnectionScope, ConnectionState};
use super::driver::{ClientInfo, ConnectParams, Driver, DriverError, DriverResult, ServerInfo};
use super::errors::ErrorLog;
use super::query::{collect_result, QueryOptions, StatementInput, Statements};
use super::response::{Outcome, Response};
use super::sqlite::SqliteDriver;
use super::transaction::{TransactionContext, TransactionState};
use super::value::Value;
use crate::config::DbConfig;
use crate::core::debug::{BlockHint, DebugController, DebugSetting, DebugSink, DebugState, EmitContext};
use crate::core::{DbError, Result};
use serde_json::Map;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Note appended to a batch failure when earlier statements succeeded.
pub const BATCH_PREVIOUS_OK: &str = "All previous statements in this batch executed successfully.";
/// First message of a response short-circuited by a failed transaction.
pub const TRANSACTION_FAILED: &str = "Transaction failed.";
/// Message of a response whose connection could not be opened.
pub const CONNECTION_UNAVAILABLE: &str = "Unable to establish connection to the database server.";
/// Appended to the error list when the automatic rollback fails.
pub const ROLLBACK_FAILED: &str = "Rollback failed.";

pub struct Session<D: Driver> {
    id: Uuid,
    config: DbConfig,
    driver: D,
    connection: ConnectionState<D>,
    transaction: TransactionContext,
    errors: ErrorLog,
    debug: DebugController,
}

impl<D: Driver> std::fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("host", &self.config.host)
            .field("database", &self.config.database)
            .field("connection", &self.connection)
            .field("transaction", &self.transaction.state())
            .field("debug", &self.debug)
            .finish()
    }
}

impl Session<SqliteDriver> {
    /// Creates a session backed by the SQLite driver.
    pub fn sqlite(config: DbConfig) -> Self {
        Session::new(config, SqliteDriver::new())
    }
}

impl<D: Driver> Session<D> {
    pub fn new(config: DbConfig, driver: D) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, "Created session for {} / {}", config.host, config.database);
        Session {
            id,
            config,
            driver,
            connection: ConnectionState::new(),
            transaction: TransactionContext::new(),
            errors: ErrorLog::new(),
            debug: DebugController::default(),
        }
    }

    pub fn with_debug_sink(mut self, sink: Box<dyn DebugSink>) -> Self {
        self.debug.set_sink(sink);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    pub fn is_persistent(&self) -> bool {
        self.connection.is_persistent()
    }

    pub fn connection_scope(&self) -> ConnectionScope {
        self.connection.scope(self.transaction.is_active())
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.connection.server_info()
    }

    pub fn client_info(&self) -> Option<&ClientInfo> {
        self.connection.client_info()
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transaction.state()
    }

    /// Errors accumulated by the active transaction, or by the last call
    /// when no transaction is active.
    pub fn errors(&self) -> &[String] {
        self.active_log().messages()
    }

    pub fn debug_state(&self) -> DebugState {
        self.debug.state()
    }

    pub fn configure_debug(&mut self, setting: impl Into<DebugSetting>) -> &mut Self {
        self.debug.configure(setting.into());
        self
    }

    /// Opens the connection explicitly, with `options` merged over the
    /// configured driver options. A persistent connection stays open until
    /// [`Session::close`].
    pub fn connect(&mut self, persist: bool, options: &Map<String, serde_json::Value>) -> bool {
        self.begin_call();
        self.open(persist, options)
    }

    /// Closes the connection. Refused while a transaction is active.
    pub fn close(&mut self) -> bool {
        if self.transaction.is_active() {
            warn!(session = %self.id, "Refusing to close the connection inside an active transaction");
            self.emit("Cannot close the connection while a transaction is active!", BlockHint::Wrap);
            return false;
        }
        self.close_connection()
    }

    /// Executes one statement or a batch.
    ///
    /// The batch stops at the first failing statement; the returned failure
    /// carries the accumulated errors, a note when earlier statements
    /// succeeded and the text of every statement that was not executed.
    pub fn query(&mut self, statements: impl Into<Statements>, options: &QueryOptions) -> Result<Outcome> {
        let statements = statements.into();
        if statements.is_empty() {
            return Err(DbError::Programming("A statement batch needs at least one statement".to_string()));
        }
        self.begin_call();
        if let Some(response) = self.short_circuit() {
            return Ok(Outcome::Single(response));
        }
        if !self.open(false, &Map::new()) {
            return Ok(Outcome::Single(self.connection_failure()));
        }

        let all: Vec<&str> = statements.iter().collect();
        let mut list = Vec::with_capacity(all.len());
        for (index, sql) in all.iter().copied().enumerate() {
            let response = self.run_statement(StatementInput::Sql(sql), options);
            if !response.is_success() {
                let failure = self.batch_failure(index, &all[index + 1..]);
                self.auto_close();
                return Ok(Outcome::Single(failure));
            }
            list.push(response);
        }

        self.finish_call();
        Ok(Outcome::from_list(list))
    }

    /// Executes a single statement and returns its response.
    pub fn query_one(&mut self, sql: &str, options: &QueryOptions) -> Response {
        match self.query(sql, options) {
            Ok(Outcome::Single(response)) => response,
            Ok(Outcome::Batch(mut list)) => list.pop().unwrap_or_else(|| Response::failure(Vec::new())),
            Err(e) => Response::failure(vec![e.to_string()]),
        }
    }

    /// Prepares `sql` with bound `params`, executes it and normalizes the
    /// result like [`Session::query`].
    pub fn query_params(&mut self, sql: &str, params: &[Value], options: &QueryOptions) -> Response {
        self.begin_call();
        if let Some(response) = self.short_circuit() {
            return response;
        }
        if !self.open(false, &Map::new()) {
            return self.connection_failure();
        }

        self.emit(&format!("Unprepared SQL: {}\n\nParams: {:?}", sql, params), BlockHint::None);
        let prepared = match self.with_handle(|driver, handle| driver.prepare_and_bind(handle, sql, params)) {
            Ok(prepared) => prepared,
            Err(errors) => return self.fail_call("Preparing statement failed", errors, sql),
        };
        let cursor = match self.with_handle(|driver, handle| driver.execute_prepared(handle, prepared)) {
            Ok(cursor) => cursor,
            Err(errors) => return self.fail_call("Executing statement failed", errors, sql),
        };

        let response = self.run_statement(StatementInput::Executed { sql, cursor }, options);
        if response.is_success() {
            self.finish_call();
        } else {
            self.auto_close();
        }
        response
    }

    /// Starts a transaction, opening a connection that stays open until the
    /// transaction is committed or rolled back.
    pub fn begin(&mut self) -> bool {
        if self.transaction.is_active() {
            warn!(session = %self.id, "Transaction already active");
            self.emit("A transaction is already active!", BlockHint::Wrap);
            return false;
        }
        self.begin_call();
        if !self.open(false, &Map::new()) {
            return false;
        }
        self.connection.release_persistence();

        self.emit("Begin transaction...", BlockHint::Close);
        match self.with_handle(|driver, handle| driver.begin_transaction(handle)) {
            Ok(()) => {
                self.transaction.begin();
                debug!(session = %self.id, "Transaction started");
                true
            }
            Err(errors) => {
                self.record("Transaction init failed", errors, None);
                self.auto_close();
                false
            }
        }
    }

    /// Commits the active transaction. Without one this is a no-op that
    /// reports success; a failed transaction is rolled back instead and
    /// reports false.
    pub fn commit(&mut self) -> bool {
        if !self.transaction.is_active() {
            warn!(session = %self.id, "No active transaction to commit");
            self.emit("No active transaction to commit!", BlockHint::Wrap);
            return true;
        }
        if self.transaction.is_failed() {
            info!(session = %self.id, "Transaction failed; rolling back instead of committing");
            self.rollback();
            return false;
        }

        self.emit("Commit transaction.", BlockHint::Open);
        match self.with_handle(|driver, handle| driver.commit(handle)) {
            Ok(()) => {
                self.end_transaction();
                debug!(session = %self.id, "Transaction committed");
                true
            }
            Err(errors) => {
                self.record("Commit failed", errors, None);
                false
            }
        }
    }

    /// Rolls back the active transaction. Without one this is a no-op that
    /// reports success.
    pub fn rollback(&mut self) -> bool {
        if !self.transaction.is_active() {
            warn!(session = %self.id, "No active transaction to roll back");
            self.emit("No active transaction to roll back!", BlockHint::Wrap);
            return true;
        }

        self.emit("Rollback transaction.", BlockHint::Open);
        match self.with_handle(|driver, handle| driver.rollback(handle)) {
            Ok(()) => {
                self.end_transaction();
                debug!(session = %self.id, "Transaction rolled back");
                true
            }
            Err(errors) => {
                self.record("Rollback failed", errors, None);
                false
            }
        }
    }

    /// Runs `statements` as one batch inside a transaction: commits when
    /// every statement succeeded, rolls back otherwise.
    pub fn run_transaction(&mut self, statements: impl Into<Statements>) -> Result<bool> {
        let statements = statements.into();
        if statements.is_empty() {
            return Err(DbError::Programming("A transaction needs at least one statement".to_string()));
        }
        if !self.begin() {
            return Ok(false);
        }
        self.query(statements, &QueryOptions::default())?;
        if self.transaction.is_failed() {
            if !self.rollback() {
                self.transaction.errors_mut().push(ROLLBACK_FAILED);
            }
            return Ok(false);
        }
        Ok(self.commit())
    }

    fn active_log(&self) -> &ErrorLog {
        if self.transaction.is_active() {
            self.transaction.errors()
        } else {
            &self.errors
        }
    }

    fn begin_call(&mut self) {
        if !self.transaction.is_active() {
            self.errors.clear();
        }
    }

    fn emit_context(&self) -> EmitContext {
        EmitContext {
            transaction_active: self.transaction.is_active(),
            persistent: self.connection.is_persistent(),
        }
    }

    fn emit(&mut self, text: &str, hint: BlockHint) {
        let context = self.emit_context();
        self.debug.emit(text, hint, context);
    }

    /// Records driver errors in the active log and returns its messages.
    fn record(&mut self, label: &str, errors: Vec<DriverError>, sql: Option<&str>) -> Vec<String> {
        let in_transaction = self.transaction.is_active();
        let log = if in_transaction {
            self.transaction.errors_mut()
        } else {
            &mut self.errors
        };
        let summary = log.record(errors, sql);
        let messages = log.messages().to_vec();
        if in_transaction {
            self.transaction.mark_failed();
        }
        error!(session = %self.id, "{}: {}", label, summary.join("; "));
        self.emit(&format!("{}:\n    {}", label, summary.join("\n\n")), BlockHint::Close);
        messages
    }

    fn with_handle<T>(&mut self, f: impl FnOnce(&mut D, &mut D::Handle) -> DriverResult<T>) -> DriverResult<T> {
        match self.connection.handle_mut() {
            Some(handle) => f(&mut self.driver, handle),
            None => Err(vec![DriverError::new("Connection is not open")]),
        }
    }

    fn open(&mut self, persist: bool, overrides: &Map<String, serde_json::Value>) -> bool {
        if self.connection.is_open() {
            return true;
        }
        let hint = if persist { BlockHint::Wrap } else { BlockHint::Open };
        let banner = format!(
            "Open connection...\n    Server:   {}\n    Database: {}",
            self.config.host, self.config.database
        );
        self.emit(&banner, hint);

        let options = self.config.driver_options(overrides);
        let params = ConnectParams {
            host: &self.config.host,
            database: &self.config.database,
            user: &self.config.user,
            password: &self.config.password,
            options: &options,
        };
        match self.connection.ensure_open(&mut self.driver, &params, persist) {
            Ok(_) => true,
            Err(errors) => {
                self.record("Connection failed", errors, None);
                false
            }
        }
    }

    fn close_connection(&mut self) -> bool {
        if !self.connection.is_open() {
            return true;
        }
        let hint = if self.connection.is_persistent() {
            BlockHint::Wrap
        } else {
            BlockHint::Close
        };
        self.emit("Close connection.", hint);
        match self.connection.close(&mut self.driver) {
            Ok(()) => true,
            Err(errors) => {
                self.record("Close failed", errors, None);
                false
            }
        }
    }

    fn auto_close(&mut self) {
        if self.connection.is_open() && self.connection.should_auto_close(self.transaction.is_active()) {
            self.close_connection();
        }
    }

    fn finish_call(&mut self) {
        self.auto_close();
        self.debug.tick();
    }

    fn end_transaction(&mut self) {
        let errors = self.transaction.finish();
        self.errors.clear();
        for message in errors {
            self.errors.push(message);
        }
        self.close_connection();
    }

    fn short_circuit(&mut self) -> Option<Response> {
        if !self.transaction.is_failed() {
            return None;
        }
        debug!(session = %self.id, "Skipping statement in failed transaction");
        self.emit("Transaction failed; statement not executed.", BlockHint::Wrap);
        let mut errors = vec![TRANSACTION_FAILED.to_string()];
        errors.extend(self.transaction.errors().messages().iter().cloned());
        Some(Response::failure(errors))
    }

    fn connection_failure(&self) -> Response {
        let mut errors = vec![CONNECTION_UNAVAILABLE.to_string()];
        errors.extend(self.active_log().messages().iter().cloned());
        Response::failure(errors)
    }

    fn fail_call(&mut self, label: &str, errors: Vec<DriverError>, sql: &str) -> Response {
        let messages = self.record(label, errors, Some(sql));
        self.auto_close();
        Response::failure(messages)
    }

    fn batch_failure(&self, index: usize, skipped: &[&str]) -> Response {
        let mut errors = self.active_log().messages().to_vec();
        if index > 0 {
            errors.push(BATCH_PREVIOUS_OK.to_string());
        }
        for sql in skipped {
            errors.push(format!("Statement not executed:\n{}", sql));
        }
        Response::failure(errors)
    }

    fn run_statement(&mut self, input: StatementInput<'_, D::Cursor>, options: &QueryOptions) -> Response {
        let (sql, mut cursor) = match input {
            StatementInput::Sql(sql) => {
                self.emit(&format!("Query...\n{}", sql), BlockHint::None);
                match self.with_handle(|driver, handle| driver.execute(handle, sql)) {
                    Ok(cursor) => (sql, cursor),
                    Err(errors) => return Response::failure(self.record("Query failed", errors, Some(sql))),
                }
            }
            StatementInput::Executed { sql, cursor } => (sql, cursor),
        };
        match collect_result(&mut cursor, options) {
            Ok((payload, rows_affected)) => Response::success(payload, rows_affected),
            Err(errors) => Response::failure(self.record("Fetch failed", errors, Some(sql))),
        }
    }
}

impl<D: Driver> Drop for Session<D> {
    fn drop(&mut self) {
        if !self.connection.is_open() {
            return;
        }
        if self.transaction.is_active() {
            warn!(session = %self.id, "Session dropped inside an active transaction; closing without commit");
        }
        if let Err(errors) = self.connection.close(&mut self.driver) {
            error!(session = %self.id, "Failed to close connection on drop: {:?}", errors);
        }
    }
}
