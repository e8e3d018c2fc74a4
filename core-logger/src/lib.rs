//! A small leveled-sink capability trait, consumed by both the buddy arena
//! and the disk B-tree.
//!
//! Neither core requires a logger to be installed: every call site is
//! written against `Option<Arc<dyn Logger>>` (or, where a concrete value is
//! more convenient than threading an `Option` around, [`NoopLogger`]).

#![deny(missing_docs)]

use std::fmt;

/// Six leveled text-sink methods. Implementations should treat every method
/// as non-blocking and infallible from the caller's point of view; a logger
/// that drops messages under backpressure is preferable to one that can
/// make an allocator or B-tree operation fail.
pub trait Logger: fmt::Debug + Send + Sync {
    /// Fine-grained diagnostic detail, off by default in most sinks.
    fn trace(&self, message: &str);
    /// Diagnostic detail useful while developing or investigating a bug.
    fn debug(&self, message: &str);
    /// Routine lifecycle events: construction, destruction, allocation
    /// counts, deallocation addresses.
    fn information(&self, message: &str);
    /// Recoverable but noteworthy conditions.
    fn warning(&self, message: &str);
    /// A surfaced error: bad pointer, exhausted arena, failed I/O.
    fn error(&self, message: &str);
    /// A fatal or undefined-behavior condition was detected.
    fn critical(&self, message: &str);
}

/// A logger that discards every message. Useful as a concrete default when
/// a caller wants a `Logger` value rather than an `Option<Arc<dyn Logger>>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn trace(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
    fn information(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn critical(&self, _message: &str) {}
}

/// Forwards the six leveled methods onto the `log` facade.
///
/// `critical` has no direct equivalent in `log`'s five levels, so it is
/// forwarded as [`log::Level::Error`] with a `"critical: "` prefix.
#[cfg(feature = "log")]
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeLogger {
    /// Target passed to the `log` macros, e.g. `"buddy_arena"`.
    target: &'static str,
}

#[cfg(feature = "log")]
impl FacadeLogger {
    /// Creates an adapter that logs under the given `log` target.
    pub const fn new(target: &'static str) -> Self {
        Self { target }
    }
}

#[cfg(feature = "log")]
impl Logger for FacadeLogger {
    fn trace(&self, message: &str) {
        log::trace!(target: self.target, "{message}");
    }

    fn debug(&self, message: &str) {
        log::debug!(target: self.target, "{message}");
    }

    fn information(&self, message: &str) {
        log::info!(target: self.target, "{message}");
    }

    fn warning(&self, message: &str) {
        log::warn!(target: self.target, "{message}");
    }

    fn error(&self, message: &str) {
        log::error!(target: self.target, "{message}");
    }

    fn critical(&self, message: &str) {
        log::error!(target: self.target, "critical: {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_logger_accepts_all_levels() {
        let logger = NoopLogger;
        logger.trace("t");
        logger.debug("d");
        logger.information("i");
        logger.warning("w");
        logger.error("e");
        logger.critical("c");
    }

    #[cfg(feature = "log")]
    #[test]
    fn facade_logger_is_constructible_as_trait_object() {
        let logger: std::sync::Arc<dyn Logger> = std::sync::Arc::new(FacadeLogger::new("test"));
        logger.information("hello");
    }
}
