use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic id source. Zero is never handed out.
#[derive(Debug)]
pub struct IdAllocator<I> {
    counter: AtomicU64,
    _marker: PhantomData<fn() -> I>,
}

impl<I> IdAllocator<I> {
    pub const fn new() -> IdAllocator<I> {
        IdAllocator {
            counter: AtomicU64::new(1),
            _marker: PhantomData,
        }
    }

    pub fn next(&self) -> I
    where
        I: From<u64>,
    {
        I::from(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Makes sure every id handed out from now on is greater than `id`.
    ///
    /// Used after restoring entities with persisted ids.
    pub fn ensure_above(&self, id: u64) {
        self.counter.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }

    /// Restarts the sequence. Only meant for test harnesses: ids handed out
    /// before the reset may be handed out again.
    pub fn reset(&self, start: u64) {
        self.counter.store(start.max(1), Ordering::Relaxed);
    }
}

impl<I> Default for IdAllocator<I> {
    fn default() -> Self {
        IdAllocator::new()
    }
}

static GLOBAL: IdAllocator<u64> = IdAllocator::new();

/// The process-wide allocator shared by every timeline and entity kind.
pub fn global() -> &'static IdAllocator<u64> {
    &GLOBAL
}

pub fn next_id() -> u64 {
    GLOBAL.next()
}
