//! Side channel for non-fatal writer events.
//!
//! The writer's core is a validate-then-serialize state machine. Events that
//! do not change its outcome, such as a sample skipping one or more slots or
//! an error swallowed while closing, are handed to a [`DiagnosticSink`]
//! instead of branching the write path.

use std::path::Path;

use crate::error::RateLogError;

/// An accepted record that did not land in the slot right after the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapEvent {
    /// The slot that would have continued the sequence (`last + 1`).
    pub expected: i64,
    /// The slot the record actually targets.
    pub actual: i64,
}

impl GapEvent {
    /// Number of slots skipped between the previous record and this one.
    ///
    /// Saturates at `i64::MAX` for gaps wider than the `i64` range.
    pub fn missing_slots(&self) -> i64 {
        self.actual.saturating_sub(self.expected)
    }
}

/// Receiver for diagnostic events emitted by a
/// [`RateLogWriter`](crate::writer::RateLogWriter).
///
/// Implementations must not panic; they run on the write path and during drop.
pub trait DiagnosticSink {
    /// Called when an accepted record leaves one or more slots empty.
    fn on_gap(&mut self, path: &Path, event: &GapEvent);

    /// Called when the final flush or release in `close` fails.
    fn on_close_error(&mut self, path: &Path, error: &RateLogError);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn on_gap(&mut self, path: &Path, event: &GapEvent) {
        (**self).on_gap(path, event);
    }

    fn on_close_error(&mut self, path: &Path, error: &RateLogError) {
        (**self).on_close_error(path, error);
    }
}

/// Default sink that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn on_gap(&mut self, path: &Path, event: &GapEvent) {
        tracing::warn!(
            path = %path.display(),
            expected = event.expected,
            actual = event.actual,
            "non-sequential rate record: {} slot(s) missing",
            event.missing_slots()
        );
    }

    fn on_close_error(&mut self, path: &Path, error: &RateLogError) {
        tracing::error!(path = %path.display(), "failed to close rate log: {error}");
    }
}
