mod item;
mod marker;
mod media;
mod project;
mod snap;
mod subscribers;
#[cfg(test)]
mod tests;
mod timeline;
mod track;
mod undo;

pub use self::item::{Extent, ItemSnapshot, MoveableItem};
pub use self::marker::{MarkerCommand, MarkerLabel, MarkerList};
pub use self::media::{BinClip, LoadOutcome, Loader, MediaBin};
pub use self::project::{Project, StackMode};
pub use self::snap::{SnapConsumer, SnapRegistry, WeakObservers};
pub use self::subscribers::Subscribers;
pub use self::timeline::{Groups, ItemMove, Timeline, TimelineCommand, TrackSnapshot};
pub use self::track::{Lane, Track};
pub use self::undo::{Command, Transaction, UndoEntry, UndoStack};
