use std::sync::atomic::{AtomicI32, Ordering};

use hermes_core::RequestId;

/// Per-session request id source
///
/// Ids are strictly increasing; the first id handed out is `base + 1`.
#[derive(Debug)]
pub struct RequestIdAllocator {
    last: AtomicI32,
}

impl RequestIdAllocator {
    /// Base used by sessions unless configured otherwise
    pub const DEFAULT_BASE: RequestId = 100;

    pub fn new() -> Self {
        Self::starting_after(Self::DEFAULT_BASE)
    }

    pub fn starting_after(base: RequestId) -> Self {
        Self {
            last: AtomicI32::new(base),
        }
    }

    pub fn next(&self) -> RequestId {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Most recently allocated id
    pub fn last(&self) -> RequestId {
        self.last.load(Ordering::SeqCst)
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
