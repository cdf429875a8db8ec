//! Structured log capture for assertions on tracing output.
//!
//! Capture is scoped to the calling thread with `with_default`, so parallel
//! tests never see each other's events.

use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// A captured log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Entries recorded while a closure ran.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CapturedLogs {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn contains_message(&self, message: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(message))
    }

    pub fn at_level(&self, level: Level) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }
}

/// Layer that appends every event to a [`CapturedLogs`].
struct TestLogLayer {
    sink: CapturedLogs,
}

impl<S> tracing_subscriber::Layer<S> for TestLogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        struct MessageVisitor<'a> {
            message: &'a mut String,
            fields: &'a mut Vec<(String, String)>,
        }

        impl tracing::field::Visit for MessageVisitor<'_> {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    *self.message = value.to_string();
                } else {
                    self.fields
                        .push((field.name().to_string(), value.to_string()));
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                let value_str = format!("{value:?}");
                if field.name() == "message" {
                    *self.message = value_str;
                } else {
                    self.fields.push((field.name().to_string(), value_str));
                }
            }
        }

        let metadata = event.metadata();
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut MessageVisitor {
            message: &mut message,
            fields: &mut fields,
        });

        if let Ok(mut entries) = self.sink.entries.lock() {
            entries.push(LogEntry {
                level: *metadata.level(),
                target: metadata.target().to_string(),
                message,
                fields,
            });
        }
    }
}

/// Run `f` with a thread-local subscriber at `level` and return what it logged.
pub fn capture_logs<R>(level: &str, f: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let captured = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(TestLogLayer {
            sink: captured.clone(),
        });
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_message_and_fields() {
        let ((), logs) = capture_logs("debug", || {
            tracing::warn!(strategy = "sqlite", "backend initialization failed");
            tracing::trace!("filtered out");
        });
        let warnings = logs.at_level(Level::WARN);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field("strategy"), Some("sqlite"));
        assert!(logs.contains_message("initialization failed"));
        assert!(!logs.contains_message("filtered out"));
    }
}
