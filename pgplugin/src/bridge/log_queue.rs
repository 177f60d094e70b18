//! Ordered log queue drained by the host.
//!
//! [`LogQueueLayer`] is a `tracing_subscriber` layer that copies every event
//! at or above a minimum severity into a [`LogQueue`]. The host pulls the
//! queued entries whenever it likes; nothing is written to a terminal.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;

/// Severity of a queued entry, with the host's numeric scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Critical = 5,
}

impl Severity {
    /// Numeric value passed to the host.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Severity of a tracing level. Tracing has no critical level.
    pub fn from_level(level: &Level) -> Self {
        match *level {
            Level::TRACE => Severity::Trace,
            Level::DEBUG => Severity::Debug,
            Level::INFO => Severity::Info,
            Level::WARN => Severity::Warn,
            Level::ERROR => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// One queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub message: String,
    pub severity: Severity,
}

/// Shared FIFO of log entries.
#[derive(Debug, Clone, Default)]
pub struct LogQueue {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl LogQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, message: impl Into<String>, severity: Severity) {
        self.entries.lock().push_back(LogEntry {
            message: message.into(),
            severity,
        });
    }

    /// Remove and return every queued entry, oldest first.
    pub fn drain(&self) -> Vec<LogEntry> {
        self.entries.lock().drain(..).collect()
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Layer copying tracing events into a [`LogQueue`].
#[derive(Debug, Clone)]
pub struct LogQueueLayer {
    queue: LogQueue,
    min_severity: Severity,
}

impl LogQueueLayer {
    /// Queue events at `min_severity` and above.
    pub fn new(queue: LogQueue, min_severity: Severity) -> Self {
        Self {
            queue,
            min_severity,
        }
    }
}

/// Collects the message and the structured fields of an event.
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl MessageVisitor {
    fn new() -> Self {
        Self {
            message: String::new(),
            fields: Vec::new(),
        }
    }

    fn into_line(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        let fields = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(" ");
        if self.message.is_empty() {
            fields
        } else {
            format!("{} {}", self.message, fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}

impl<S> tracing_subscriber::Layer<S> for LogQueueLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let severity = Severity::from_level(event.metadata().level());
        if severity < self.min_severity {
            return;
        }

        let mut visitor = MessageVisitor::new();
        event.record(&mut visitor);
        self.queue.push(visitor.into_line(), severity);
    }
}
