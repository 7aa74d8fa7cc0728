//! Logging setup and the diagnostic collaborator used by adapters.
//!
//! Adapters never write to a global logger of their own. Each adapter holds
//! an injected [`DiagnosticSink`]; every failure path emits a structured
//! event (component, operation, message, fields) through it before the error
//! propagates to the caller. The default sink forwards to `tracing`, so a
//! process that only calls [`init_logging`] gets conventional structured
//! logs without wiring anything else.

use std::sync::Arc;

use crate::Result;

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
///
/// # Errors
/// Returns a configuration error if a global subscriber is already set.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| {
            crate::error::ConduitError::configuration(format!(
                "Failed to initialize logging: {e}"
            ))
        })?;

    Ok(())
}

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A structured diagnostic event emitted by an adapter.
#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    pub severity: Severity,
    /// Emitting component, e.g. `"sqlite"` or `"postgres"`
    pub component: &'static str,
    /// Operation during which the event occurred, e.g. `"execute"`
    pub operation: &'static str,
    pub message: String,
    /// Operation-specific context (query text, parameters, table name, ...)
    pub fields: Vec<(&'static str, serde_json::Value)>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DiagnosticEvent {
    /// Builds an event stamped with the current time.
    #[must_use]
    pub fn new(
        severity: Severity,
        component: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            component,
            operation,
            message: message.into(),
            fields: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Attaches a context field.
    #[must_use]
    pub fn with_field(mut self, key: &'static str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.push((key, value.into()));
        self
    }
}

/// Collaborator that receives diagnostic events from adapters.
///
/// Constructed once per process and shared by every adapter instance; the
/// contract is the event shape, not any particular output format.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// Default sink that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        let fields = serde_json::Value::Object(
            event
                .fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        );
        match event.severity {
            Severity::Info => tracing::info!(
                component = event.component,
                operation = event.operation,
                %fields,
                "{}",
                event.message
            ),
            Severity::Warning => tracing::warn!(
                component = event.component,
                operation = event.operation,
                %fields,
                "{}",
                event.message
            ),
            Severity::Error => tracing::error!(
                component = event.component,
                operation = event.operation,
                %fields,
                "{}",
                event.message
            ),
        }
    }
}

/// Returns the process-default sink (forwards to `tracing`).
#[must_use]
pub fn default_sink() -> Arc<dyn DiagnosticSink> {
    Arc::new(TracingSink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CapturingSink {
        events: Mutex<Vec<DiagnosticEvent>>,
    }

    impl DiagnosticSink for CapturingSink {
        fn emit(&self, event: DiagnosticEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_event_carries_fields() {
        let sink = CapturingSink {
            events: Mutex::new(Vec::new()),
        };
        sink.emit(
            DiagnosticEvent::new(Severity::Error, "sqlite", "execute", "statement failed")
                .with_field("query", "SELECT 1")
                .with_field("params", "[]"),
        );

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].component, "sqlite");
        assert_eq!(events[0].operation, "execute");
        assert_eq!(events[0].fields.len(), 2);
        assert_eq!(events[0].fields[0].0, "query");
    }

    #[test]
    fn test_verbosity_levels() {
        let test_cases = [
            ((true, 0), tracing::Level::ERROR),
            ((true, 5), tracing::Level::ERROR),
            ((false, 0), tracing::Level::INFO),
            ((false, 1), tracing::Level::DEBUG),
            ((false, 2), tracing::Level::TRACE),
        ];

        for ((quiet, verbose), expected) in test_cases {
            let level = match (quiet, verbose) {
                (true, _) => tracing::Level::ERROR,
                (false, 0) => tracing::Level::INFO,
                (false, 1) => tracing::Level::DEBUG,
                (false, _) => tracing::Level::TRACE,
            };
            assert_eq!(level, expected);
        }
    }
}
