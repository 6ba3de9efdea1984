use std::sync::Arc;

/// Debug lines carry this prefix so embedders can route them verbatim.
pub const DEBUG_PREFIX: &str = "[MCLC]:";

/// Subscriber interface for pipeline events, one method per event kind.
/// Implementations forward updates to the embedding application; every
/// method defaults to a no-op so sinks override only what they consume.
///
/// Sinks are shared across concurrent download tasks, so implementations
/// must be cheap and non-blocking.
pub trait EventSink: Send + Sync {
    /// Human-readable diagnostic line, prefixed with [`DEBUG_PREFIX`].
    fn debug(&self, _message: &str) {}

    /// Byte-level progress of one transfer. `total` is zero when the
    /// server sent no Content-Length.
    fn download_status(&self, _name: &str, _kind: &str, _current: u64, _total: u64) {}

    /// One file finished downloading.
    fn download(&self, _name: &str) {}

    /// Per-phase step counter (`task` of `total` settled).
    fn progress(&self, _kind: &str, _task: usize, _total: usize) {}

    /// The final token list, emitted just before the child is spawned.
    fn arguments(&self, _tokens: &[String]) {}

    /// A line of child stdout/stderr.
    fn data(&self, _line: &str) {}

    /// Child exit code; `1` also signals a failed java probe.
    fn close(&self, _code: i32) {}

    /// The client package finished extracting into the root.
    fn package_extract(&self) {}
}

/// Sink that swallows everything. Useful for tests and headless callers.
pub struct SilentSink;

impl EventSink for SilentSink {}

pub(crate) fn emit_debug(sink: &Arc<dyn EventSink>, message: &str) {
    sink.debug(&format!("{} {}", DEBUG_PREFIX, message));
}
