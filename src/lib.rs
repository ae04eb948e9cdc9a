// Core infrastructure modules
pub mod core;

// Configuration surface
pub mod config;

#[cfg(test)]
mod test_utils;

pub use crate::config::DbConfig;
pub use crate::core::db::{Outcome, Payload, QueryOptions, Response, Session};
pub use crate::core::{DbError, Result};
