//! Test-reporting port and a recording implementation.
//!
//! Expectation failures surface through this side channel rather than as
//! panics or error returns, matching how test frameworks accumulate
//! failures without unwinding. Hooks may report from any thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Side-channel failure sink for the expectation machinery.
pub trait Reporter: Send + Sync {
    /// Record a test failure.
    fn error(&self, message: &str);

    /// Record an informational line.
    fn log(&self, message: &str);

    /// Whether any failure has been recorded.
    fn failed(&self) -> bool;
}

/// Recording reporter: collects failures and log lines so tests can assert
/// on outcome and message content after the fact.
#[derive(Debug, Default)]
pub struct TestReporter {
    errors: Mutex<Vec<String>>,
    logs: Mutex<Vec<String>>,
    has_failed: AtomicBool,
}

impl TestReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded failure messages.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Snapshot of recorded log lines.
    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Reporter for TestReporter {
    fn error(&self, message: &str) {
        self.has_failed.store(true, Ordering::SeqCst);
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }

    fn log(&self, message: &str) {
        self.logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }

    fn failed(&self) -> bool {
        self.has_failed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clean() {
        let reporter = TestReporter::new();
        assert!(!reporter.failed());
        assert!(reporter.errors().is_empty());
        assert!(reporter.logs().is_empty());
    }

    #[test]
    fn error_marks_failed_and_records_message() {
        let reporter = TestReporter::new();
        reporter.error("boom");
        assert!(reporter.failed());
        assert_eq!(reporter.errors(), vec!["boom".to_string()]);
    }

    #[test]
    fn log_does_not_fail_the_test() {
        let reporter = TestReporter::new();
        reporter.log("just saying");
        assert!(!reporter.failed());
        assert_eq!(reporter.logs(), vec!["just saying".to_string()]);
    }
}
