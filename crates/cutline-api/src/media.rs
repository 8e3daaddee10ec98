use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cutline_core::FrameTime;
use parking_lot::Mutex;

use crate::id::define_ids;
use crate::LoadError;

define_ids! {
    pub struct BinClipId;
}

/// Opaque media source backing a timeline item.
///
/// The model only ever looks at the source range and validity. The out
/// point is exclusive: the playable length is `get_out() - get_in()`.
pub trait Producer: Debug + Send + Sync {
    fn get_in(&self) -> FrameTime;

    fn get_out(&self) -> FrameTime;

    fn set_in_and_out(&self, in_point: FrameTime, out_point: FrameTime);

    fn is_valid(&self) -> bool;

    /// A new, independent producer over the same media.
    fn cut(&self, in_point: FrameTime, out_point: FrameTime) -> Arc<dyn Producer>;

    fn duration(&self) -> FrameTime {
        self.get_out() - self.get_in()
    }
}

/// Producer that only tracks its range. Used for generated clips (colour,
/// blank) and as a stand-in while media is loading.
#[derive(Debug)]
pub struct MemoryProducer {
    range: Mutex<(FrameTime, FrameTime)>,
    valid: AtomicBool,
}

impl MemoryProducer {
    pub fn new(in_point: FrameTime, out_point: FrameTime) -> MemoryProducer {
        MemoryProducer {
            range: Mutex::new((in_point, out_point)),
            valid: AtomicBool::new(true),
        }
    }

    pub fn with_duration(frames: i64) -> Arc<MemoryProducer> {
        Arc::new(MemoryProducer::new(
            FrameTime::ZERO,
            FrameTime::from_frames(frames),
        ))
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::Release);
    }
}

impl Producer for MemoryProducer {
    fn get_in(&self) -> FrameTime {
        self.range.lock().0
    }

    fn get_out(&self) -> FrameTime {
        self.range.lock().1
    }

    fn set_in_and_out(&self, in_point: FrameTime, out_point: FrameTime) {
        *self.range.lock() = (in_point, out_point);
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn cut(&self, in_point: FrameTime, out_point: FrameTime) -> Arc<dyn Producer> {
        let cut = MemoryProducer::new(in_point, out_point);
        cut.set_valid(self.is_valid());
        Arc::new(cut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipStatus {
    Loading,
    Ready,
    /// The clip was valid once but its media can no longer be resolved.
    Missing,
    Invalid,
}

/// Cooperative cancellation flag shared with a background load.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Resolves a resource string into a producer. Runs on a background thread
/// and should poll `cancel` between expensive steps.
pub trait ProducerResolver: Send + Sync + 'static {
    fn resolve(&self, resource: &str, cancel: &CancelToken)
        -> Result<Arc<dyn Producer>, LoadError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinEvent {
    ClipAdded { id: BinClipId },
    StatusChanged { id: BinClipId, status: ClipStatus },
    ClipRemoved { id: BinClipId },
}
