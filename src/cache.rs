//! Dirty-flagged value caching.

/// A cached value guarded by a dirty flag.
///
/// Mutators call [`invalidate`](Self::invalidate) in O(1); readers call
/// [`get_or_update`](Self::get_or_update), which recomputes only while the
/// flag is set. Between two invalidations the closure therefore runs at most
/// once, which [`recomputes`](Self::recomputes) makes observable.
#[derive(Clone, Debug)]
pub struct Cached<T> {
    value: T,
    dirty: bool,
    recomputes: u64,
}

impl<T> Cached<T> {
    /// Start dirty so the first read computes a real value.
    pub fn new(initial: T) -> Self {
        Self {
            value: initial,
            dirty: true,
            recomputes: 0,
        }
    }

    /// Mark the cached value as stale.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of recomputations performed so far.
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }

    /// Return the cached value, recomputing it first when stale.
    pub fn get_or_update(&mut self, compute: impl FnOnce() -> T) -> &T {
        if self.dirty {
            self.value = compute();
            self.dirty = false;
            self.recomputes += 1;
        }
        &self.value
    }
}
