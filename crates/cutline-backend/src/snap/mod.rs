#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Weak;

use cutline_api::FrameTime;
use parking_lot::Mutex;

/// Something interested in frame positions worth snapping to.
pub trait SnapConsumer: Send + Sync {
    fn add_point(&self, frame: FrameTime);

    fn remove_point(&self, frame: FrameTime);
}

/// Non-owning list of observers. Entries whose target has been dropped are
/// removed while notifying, so there is no explicit unregistration.
pub struct WeakObservers<T: ?Sized> {
    entries: Vec<Weak<T>>,
}

impl<T: ?Sized> WeakObservers<T> {
    pub fn new() -> WeakObservers<T> {
        WeakObservers {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, observer: Weak<T>) {
        self.entries.push(observer);
    }

    pub fn notify(&mut self, mut f: impl FnMut(&T)) {
        self.entries.retain(|weak| match weak.upgrade() {
            Some(observer) => {
                f(&observer);
                true
            }
            None => false,
        });
    }

    /// Number of entries, including dead ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> Default for WeakObservers<T> {
    fn default() -> WeakObservers<T> {
        WeakObservers::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for WeakObservers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakObservers")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Multiset of snap points. A frame stays registered while at least one
/// contributor (clip edge, marker) still claims it.
#[derive(Debug, Default)]
pub struct SnapRegistry {
    inner: Mutex<SnapPoints>,
}

#[derive(Debug, Default)]
struct SnapPoints {
    counts: BTreeMap<FrameTime, usize>,
    ignored: Vec<FrameTime>,
}

impl SnapPoints {
    fn candidates(&self) -> impl DoubleEndedIterator<Item = FrameTime> + '_ {
        self.counts.keys().copied()
    }

    /// A frame is hidden once every contribution to it is ignored.
    fn is_ignored(&self, frame: FrameTime) -> bool {
        let ignored = self.ignored.iter().filter(|&&f| f == frame).count();
        ignored > 0 && self.counts.get(&frame).copied().unwrap_or(0) <= ignored
    }
}

impl SnapRegistry {
    pub fn new() -> SnapRegistry {
        SnapRegistry::default()
    }

    pub fn add_point(&self, frame: FrameTime) {
        *self.inner.lock().counts.entry(frame).or_insert(0) += 1;
    }

    pub fn remove_point(&self, frame: FrameTime) {
        let mut inner = self.inner.lock();
        match inner.counts.get_mut(&frame) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                inner.counts.remove(&frame);
            }
            None => tracing::warn!(%frame, "removing unregistered snap point"),
        }
    }

    pub fn contains(&self, frame: FrameTime) -> bool {
        self.inner.lock().counts.contains_key(&frame)
    }

    /// How many contributors currently claim `frame`.
    pub fn count_at(&self, frame: FrameTime) -> usize {
        self.inner.lock().counts.get(&frame).copied().unwrap_or(0)
    }

    /// All registered frames in ascending order.
    pub fn points(&self) -> Vec<FrameTime> {
        self.inner.lock().candidates().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().counts.is_empty()
    }

    /// Nearest registered frame within `max_distance` of `frame`. On a tie
    /// the earlier frame wins.
    pub fn closest(&self, frame: FrameTime, max_distance: u64) -> Option<FrameTime> {
        let inner = self.inner.lock();

        let before = inner
            .counts
            .range(..=frame)
            .rev()
            .map(|(&f, _)| f)
            .find(|&f| !inner.is_ignored(f));
        let after = inner
            .counts
            .range(frame..)
            .map(|(&f, _)| f)
            .find(|&f| !inner.is_ignored(f));

        let best = match (before, after) {
            (Some(b), Some(a)) if a.abs_diff(frame) < b.abs_diff(frame) => a,
            (Some(b), _) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        (best.abs_diff(frame) <= max_distance).then_some(best)
    }

    pub fn next_after(&self, frame: FrameTime) -> Option<FrameTime> {
        let inner = self.inner.lock();
        let found = inner
            .counts
            .range(frame + 1..)
            .map(|(&f, _)| f)
            .find(|&f| !inner.is_ignored(f));
        found
    }

    pub fn previous_before(&self, frame: FrameTime) -> Option<FrameTime> {
        let inner = self.inner.lock();
        let found = inner
            .counts
            .range(..frame)
            .rev()
            .map(|(&f, _)| f)
            .find(|&f| !inner.is_ignored(f));
        found
    }

    /// Withdraws one contribution per entry of `frames` from queries until
    /// [`SnapRegistry::unignore`], e.g. the edges of the item being dragged.
    /// Frames other contributors also claim stay visible.
    pub fn ignore(&self, frames: &[FrameTime]) {
        self.inner.lock().ignored = frames.to_vec();
    }

    pub fn unignore(&self) {
        self.inner.lock().ignored.clear();
    }
}

impl SnapConsumer for SnapRegistry {
    fn add_point(&self, frame: FrameTime) {
        SnapRegistry::add_point(self, frame);
    }

    fn remove_point(&self, frame: FrameTime) {
        SnapRegistry::remove_point(self, frame);
    }
}
