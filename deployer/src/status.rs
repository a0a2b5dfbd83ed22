//! Status reporting hooks
//!
//! The engine narrates its progress through a [`StatusReporter`]. The CLI
//! prints to the terminal; tests record the calls.

use std::io::Write;
use std::sync::Mutex;

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Receives user-facing progress from the engine
pub trait StatusReporter: Send + Sync {
    /// A status line (replaces the previous one in an interactive UI)
    fn status(&self, message: &str, kind: StatusKind);

    /// Short label for the current activity, e.g. "Downloading 3/10..."
    fn progress(&self, label: &str);

    /// The engine is idle again and accepts a new deployment
    fn ready(&self);
}

/// Prints status lines to stderr
#[derive(Debug, Default)]
pub struct TerminalReporter {
    /// Print progress labels as well as status lines
    pub verbose: bool,
}

impl TerminalReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl StatusReporter for TerminalReporter {
    fn status(&self, message: &str, kind: StatusKind) {
        let marker = match kind {
            StatusKind::Info => "·",
            StatusKind::Success => "✓",
            StatusKind::Warning => "⚠",
            StatusKind::Error => "✗",
        };
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{} {}", marker, message);
    }

    fn progress(&self, label: &str) {
        if self.verbose {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "  … {}", label);
        }
    }

    fn ready(&self) {}
}

/// A recorded reporter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Status(StatusKind, String),
    Progress(String),
    Ready,
}

/// Keeps every call in memory; used by tests and dry runs
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Status messages of the given kind, in order
    pub fn messages(&self, kind: StatusKind) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StatusEvent::Status(k, message) if k == kind => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: StatusEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl StatusReporter for RecordingReporter {
    fn status(&self, message: &str, kind: StatusKind) {
        self.push(StatusEvent::Status(kind, message.to_string()));
    }

    fn progress(&self, label: &str) {
        self.push(StatusEvent::Progress(label.to_string()));
    }

    fn ready(&self) {
        self.push(StatusEvent::Ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_filters_by_kind() {
        let reporter = RecordingReporter::new();
        reporter.status("fetching", StatusKind::Info);
        reporter.progress("Downloading 1/2...");
        reporter.status("oops", StatusKind::Error);
        reporter.ready();

        assert_eq!(reporter.messages(StatusKind::Error), vec!["oops".to_string()]);
        assert_eq!(reporter.events().len(), 4);
        assert_eq!(reporter.events().last(), Some(&StatusEvent::Ready));
    }
}
