//! Bounded wait over a completion counter.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::counter::CompletionCounter;
use crate::report::Reporter;

/// Default value for [`EnsureConfig`]'s timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`ensure_completion`]. Default timeout: 30 seconds.
#[derive(Clone, Debug)]
pub struct EnsureConfig {
    timeout: Duration,
}

impl EnsureConfig {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Upper bound on how long the wait may block. `Duration::ZERO` behaves
    /// as an already-elapsed timer: the wait fails unless the counter is
    /// satisfied at call time.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for EnsureConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Ensure that `counter` is satisfied within the configured duration.
///
/// Returns true iff the counter completed before the timer fired. A missing
/// counter and a timeout both mark the reporter failed; neither panics.
///
/// The blocking wait runs on its own thread, raced against the timer. On
/// timeout that thread is abandoned rather than cancelled: it parks until
/// the counter is eventually satisfied or the process exits. Single
/// attempt, no retry, no explicit cancellation.
pub fn ensure_completion<R: Reporter + ?Sized>(
    reporter: &R,
    counter: Option<&Arc<CompletionCounter>>,
    config: EnsureConfig,
) -> bool {
    let Some(counter) = counter else {
        reporter.error("expectation counter is missing");
        return false;
    };

    // An already-satisfied counter wins the race regardless of timeout.
    if counter.is_satisfied() {
        return true;
    }

    let (completed_tx, completed_rx) = mpsc::channel();
    let waited = Arc::clone(counter);
    thread::spawn(move || {
        waited.wait();
        // The receiver is gone when the wait timed out; nothing to do then.
        let _ = completed_tx.send(());
    });

    match completed_rx.recv_timeout(config.timeout) {
        Ok(()) => true,
        Err(_) => {
            reporter.error(&format!(
                "tasks did not complete within: {:?}",
                config.timeout
            ));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TestReporter;

    fn armed(n: u64) -> Arc<CompletionCounter> {
        let counter = Arc::new(CompletionCounter::new());
        counter.add(n);
        counter
    }

    fn satisfy_after(counter: &Arc<CompletionCounter>, delay: Duration) {
        let producer = Arc::clone(counter);
        thread::spawn(move || {
            thread::sleep(delay);
            producer.done();
        });
    }

    #[test]
    fn missing_counter_fails_immediately() {
        let reporter = TestReporter::new();

        let ok = ensure_completion(&reporter, None, EnsureConfig::new());

        assert!(!ok);
        assert!(reporter.failed());
    }

    #[test]
    fn zero_timeout_fails_while_counter_is_armed() {
        let reporter = TestReporter::new();
        let counter = armed(1);
        satisfy_after(&counter, Duration::from_millis(200));

        let ok = ensure_completion(
            &reporter,
            Some(&counter),
            EnsureConfig::new().timeout(Duration::ZERO),
        );

        assert!(!ok);
        assert!(reporter.failed());
    }

    #[test]
    fn zero_timeout_succeeds_when_already_satisfied() {
        let reporter = TestReporter::new();
        let counter = Arc::new(CompletionCounter::new());

        let ok = ensure_completion(
            &reporter,
            Some(&counter),
            EnsureConfig::new().timeout(Duration::ZERO),
        );

        assert!(ok);
        assert!(!reporter.failed());
    }

    #[test]
    fn slower_task_than_timeout_fails_with_duration_in_message() {
        let reporter = TestReporter::new();
        let counter = armed(1);
        satisfy_after(&counter, Duration::from_millis(500));

        let ok = ensure_completion(
            &reporter,
            Some(&counter),
            EnsureConfig::new().timeout(Duration::from_millis(50)),
        );

        assert!(!ok);
        assert!(reporter.failed());
        let errors = reporter.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("50ms"), "got: {}", errors[0]);
    }

    #[test]
    fn faster_task_than_timeout_succeeds() {
        let reporter = TestReporter::new();
        let counter = armed(1);
        satisfy_after(&counter, Duration::from_millis(20));

        let ok = ensure_completion(
            &reporter,
            Some(&counter),
            EnsureConfig::new().timeout(Duration::from_secs(5)),
        );

        assert!(ok);
        assert!(!reporter.failed());
    }
}
