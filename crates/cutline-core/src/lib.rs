pub mod collections;
pub mod id;
pub mod time;

pub use self::id::{next_id, IdAllocator};
pub use self::time::{FrameRate, FrameTime};
