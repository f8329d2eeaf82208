//! Event log boundary used by the non-failing converter variants.

use parking_lot::Mutex;
use tracing::error;

use crate::error::FxError;

/// Sink for errors swallowed by `try_*` operations.
pub trait EventLog: Send + Sync {
    fn log_exception(&self, category: &str, action: &str, error: &FxError);
}

/// Emits swallowed errors as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn log_exception(&self, category: &str, action: &str, err: &FxError) {
        error!(
            category = category,
            action = action,
            code = err.error_code(),
            error = %err,
            "Exception logged"
        );
    }
}

/// A logged event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub category: String,
    pub action: String,
    pub code: &'static str,
    pub message: String,
}

/// Keeps logged events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<LoggedEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events logged so far.
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventLog for MemoryEventLog {
    fn log_exception(&self, category: &str, action: &str, err: &FxError) {
        self.events.lock().push(LoggedEvent {
            category: category.to_string(),
            action: action.to_string(),
            code: err.error_code(),
            message: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_event_log() {
        let log = MemoryEventLog::new();
        assert!(log.is_empty());

        log.log_exception(
            "CurrencyConverter",
            "TryGetExchangeRate",
            &FxError::UnknownCurrency("XYZ".into()),
        );

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code, "UNKNOWN_CURRENCY");
        assert_eq!(events[0].action, "TryGetExchangeRate");
        assert!(events[0].message.contains("XYZ"));
    }
}
