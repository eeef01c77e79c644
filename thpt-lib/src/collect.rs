//! Forced collection hook.
//!
//! Rust has no tracing garbage collector, so the "collect now" request
//! of a GC signal maps onto a [`Collector`]: anything able to pause and
//! release cached memory (allocator arenas, pools, caches) on demand.

/// Releases cached memory on request.
///
/// Called synchronously from the code path acknowledging a GC signal,
/// the acknowledgement is only produced once `collect` returns.
pub trait Collector: Send + Sync + 'static {
    fn collect(&self);
}

impl<F> Collector for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn collect(&self) {
        (self)()
    }
}

/// [`Collector`] which does nothing.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct NoopCollector;

impl Collector for NoopCollector {
    #[inline(always)]
    fn collect(&self) {}
}
