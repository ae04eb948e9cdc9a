/// Error Aggregator Module
///
/// Accumulates error messages for the lifetime of a transaction or of a
/// single non-transactional call. Messages are kept in order of arrival and
/// deduplicated by text.
use super::driver::{dedup_errors, DriverError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLog {
    messages: Vec<String>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records driver error records, appending the offending SQL to each
    /// message when given.
    ///
    /// Returns the distinct raw driver messages of this call, suitable for a
    /// debug summary. Records with an empty message are ignored.
    pub fn record(&mut self, errors: Vec<DriverError>, sql: Option<&str>) -> Vec<String> {
        let mut summary: Vec<String> = Vec::new();
        for error in dedup_errors(errors) {
            if error.message.is_empty() {
                continue;
            }
            let message = match sql {
                Some(sql) => format!("{}\nIn query:\n{}", error.message, sql),
                None => error.message.clone(),
            };
            self.push(message);
            if !summary.contains(&error.message) {
                summary.push(error.message);
            }
        }
        summary
    }

    /// Appends a message unless an identical one is already recorded.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.messages.contains(&message) {
            self.messages.push(message);
        }
    }

    pub fn has_failed(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_sql_and_dedups() {
        let mut log = ErrorLog::new();
        let summary = log.record(
            vec![
                DriverError::new("no such table: t"),
                DriverError::new("no such table: t"),
                DriverError::new(""),
            ],
            Some("SELECT * FROM t"),
        );
        assert_eq!(summary, vec!["no such table: t".to_string()]);
        assert_eq!(log.messages(), &["no such table: t\nIn query:\nSELECT * FROM t".to_string()]);
        assert!(log.has_failed());
    }

    #[test]
    fn test_messages_dedup_across_calls() {
        let mut log = ErrorLog::new();
        log.record(vec![DriverError::new("x").with_code(1)], None);
        log.record(vec![DriverError::new("x").with_code(2)], None);
        log.push("x");
        log.push("y");
        assert_eq!(log.messages(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_take_resets() {
        let mut log = ErrorLog::new();
        assert!(!log.has_failed());
        log.push("a");
        assert_eq!(log.take(), vec!["a".to_string()]);
        assert!(!log.has_failed());
    }
}
