//! Construction-time options, builder-style.

use std::sync::Arc;

use core_logger::Logger;

use crate::fit::FitPolicy;
use crate::upstream::{SystemAllocator, UpstreamAllocator};

/// Options accepted by [`crate::Arena::new`].
pub struct ArenaOptions {
    pub(crate) capacity: usize,
    pub(crate) fit: FitPolicy,
    pub(crate) logger: Option<Arc<dyn Logger>>,
    pub(crate) upstream: Arc<dyn UpstreamAllocator>,
}

impl ArenaOptions {
    /// Starts from a requested byte count (rounded up to the next power of
    /// two during construction), first-fit, no logger, system heap upstream.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            fit: FitPolicy::First,
            logger: None,
            upstream: Arc::new(SystemAllocator),
        }
    }

    /// Sets the initial fit policy.
    #[must_use]
    pub fn with_fit_policy(mut self, fit: FitPolicy) -> Self {
        self.fit = fit;
        self
    }

    /// Installs a logger sink.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Overrides the upstream allocator supplying the backing region.
    #[must_use]
    pub fn with_upstream(mut self, upstream: Arc<dyn UpstreamAllocator>) -> Self {
        self.upstream = upstream;
        self
    }
}
