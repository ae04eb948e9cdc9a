/// Database Module
///
/// The driver-neutral execution layer, organized into focused submodules:
/// - **Driver boundary** (`driver.rs`, `sqlite.rs`): the `Driver` trait and its rusqlite implementation
/// - **Connection Management** (`connection.rs`): open, reuse and auto-close of the handle
/// - **Query Execution** (`query.rs`): options and result normalization
/// - **Transactions** (`transaction.rs`, `errors.rs`): transaction state and scoped error logs
/// - **Session** (`session.rs`): the facade tying them together
///
/// ## Error Handling
///
/// Statement failures are reported as failed `Response`s; `DbError` is
/// reserved for invalid API usage.
pub mod connection;
pub mod driver;
pub mod errors;
pub mod query;
pub mod response;
pub mod session;
pub mod sqlite;
pub mod transaction;
pub mod value;

pub use connection::{ConnectionScope, ConnectionState};
pub use driver::{dedup_errors, ClientInfo, ConnectParams, Cursor, Driver, DriverError, DriverResult, ServerInfo};
pub use errors::ErrorLog;
pub use query::{collect_result, QueryOptions, RowReduction, StatementInput, Statements};
pub use response::{Outcome, Payload, Response};
pub use session::{Session, BATCH_PREVIOUS_OK, CONNECTION_UNAVAILABLE, ROLLBACK_FAILED, TRANSACTION_FAILED};
pub use sqlite::{SqliteCursor, SqliteDriver, SqliteHandle, SqlitePrepared};
pub use transaction::{TransactionContext, TransactionState};
pub use value::{Key, Keyed, Row, Value};
