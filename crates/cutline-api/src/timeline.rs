use cutline_core::collections::ImVec;
use cutline_core::FrameTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::define_ids;

define_ids! {
    pub struct TrackId;

    /// A clip or composition placed on a track.
    pub struct ItemId;

    pub struct GroupId;
}

/// Timelines are identified by UUID so guide lists and nested sequences can
/// refer to them across documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimelineId(Uuid);

impl TimelineId {
    pub fn new_random() -> TimelineId {
        TimelineId(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> TimelineId {
        TimelineId(uuid)
    }

    pub fn uuid(self) -> Uuid {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackFlags {
    pub locked: bool,
    pub active: bool,
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Clip,
    Composition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupMember {
    Item(ItemId),
    Group(GroupId),
}

impl From<ItemId> for GroupMember {
    fn from(id: ItemId) -> GroupMember {
        GroupMember::Item(id)
    }
}

impl From<GroupId> for GroupMember {
    fn from(id: GroupId) -> GroupMember {
        GroupMember::Group(id)
    }
}

/// Where an item sits: its track and its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub track: TrackId,
    pub position: FrameTime,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEvent {
    TrackInserted {
        id: TrackId,
        index: usize,
    },
    TrackRemoved {
        id: TrackId,
    },
    TrackFlagsChanged {
        id: TrackId,
        flags: TrackFlags,
    },
    ItemInserted {
        id: ItemId,
        track: TrackId,
        start: FrameTime,
        end: FrameTime,
    },
    ItemRemoved {
        id: ItemId,
        track: TrackId,
    },
    ItemMoved {
        id: ItemId,
        old: Placement,
        new: Placement,
    },
    ItemResized {
        id: ItemId,
        start: FrameTime,
        end: FrameTime,
    },
    GroupChanged {
        id: GroupId,
        members: ImVec<GroupMember>,
    },
    DurationChanged {
        duration: FrameTime,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restored_ids_are_not_minted_again() {
        let fresh = ItemId::new();
        let restored = ItemId::restore(fresh.as_raw() + 1000);

        let next = TrackId::new();
        assert!(next.as_raw() > restored.as_raw());
        assert!(ItemId::MIN < fresh && fresh < ItemId::MAX);
    }

    #[test]
    fn timeline_id_serializes_as_uuid() {
        let id = TimelineId::new_random();
        let json = serde_json::to_string(&id).map_err(|e| e.to_string());
        assert_eq!(json, Ok(format!("\"{}\"", id.uuid())));
    }
}
