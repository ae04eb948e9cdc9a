/// Transaction Context Module
///
/// Transaction state and the error log scoped to it. The session drives the
/// transitions; this type only holds the state and enforces the sticky
/// failure flag.
use super::errors::ErrorLog;

/// Represents database transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No active transaction
    #[default]
    Idle,
    /// Transaction in progress
    Active,
    /// Transaction in progress with at least one recorded failure
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionContext {
    active: bool,
    failed: bool,
    errors: ErrorLog,
}

impl TransactionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransactionState {
        if !self.active {
            TransactionState::Idle
        } else if self.is_failed() {
            TransactionState::Failed
        } else {
            TransactionState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once any failure was recorded in the active transaction.
    pub fn is_failed(&self) -> bool {
        self.active && (self.failed || self.errors.has_failed())
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorLog {
        &mut self.errors
    }

    /// Enters the Active state with an empty error log.
    pub fn begin(&mut self) {
        self.active = true;
        self.failed = false;
        self.errors.clear();
    }

    /// Flips the sticky failure flag.
    pub fn mark_failed(&mut self) {
        if self.active {
            self.failed = true;
        }
    }

    /// Returns to Idle, handing back the accumulated errors.
    pub fn finish(&mut self) -> Vec<String> {
        self.active = false;
        self.failed = false;
        self.errors.take()
    }
}
