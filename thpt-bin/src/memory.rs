//! Process local memory collection, run on every GC signal.

use rama::telemetry::tracing;

use eventing_thpt_lib::collect::Collector;

/// Asks the global allocator to return unused memory to the OS.
///
/// On unix this purges all jemalloc arenas, elsewhere it only logs.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct AllocatorCollector;

impl Collector for AllocatorCollector {
    #[cfg(target_family = "unix")]
    fn collect(&self) {
        // 4096 == MALLCTL_ARENAS_ALL
        let name = c"arena.4096.purge";
        // SAFETY: purge takes no input nor output, so all pointers may be null
        let rc = unsafe {
            jemalloc_sys::mallctl(
                name.as_ptr(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                0,
            )
        };
        if rc == 0 {
            tracing::debug!("jemalloc arenas purged");
        } else {
            tracing::warn!(rc, "failed to purge jemalloc arenas");
        }
    }

    #[cfg(not(target_family = "unix"))]
    fn collect(&self) {
        tracing::debug!("no allocator collection available on this platform: skip");
    }
}
