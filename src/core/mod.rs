/// Core Module for dbexec
///
/// The command layer: driver boundary, session state machines, response
/// normalization and the shared error type.

pub mod db;
pub mod debug;
pub mod error;
pub mod sanitize;

// Re-export commonly used types for convenience
pub use error::{DbError, Result};
