use std::sync::Arc;

use cutline_api::media::Producer;
use cutline_api::timeline::{ItemId, ItemKind, TrackId};
use cutline_api::FrameTime;

/// A clip or composition. The playable range lives in the producer; the
/// item adds where it sits on the timeline.
#[derive(Debug, Clone)]
pub struct MoveableItem {
    id: ItemId,
    kind: ItemKind,
    position: FrameTime,
    track: Option<TrackId>,
    producer: Arc<dyn Producer>,
}

impl MoveableItem {
    pub fn new(id: ItemId, kind: ItemKind, producer: Arc<dyn Producer>) -> MoveableItem {
        MoveableItem {
            id,
            kind,
            position: FrameTime::ZERO,
            track: None,
            producer,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn position(&self) -> FrameTime {
        self.position
    }

    pub fn track(&self) -> Option<TrackId> {
        self.track
    }

    pub fn producer(&self) -> &Arc<dyn Producer> {
        &self.producer
    }

    pub fn in_point(&self) -> FrameTime {
        self.producer.get_in()
    }

    pub fn out_point(&self) -> FrameTime {
        self.producer.get_out()
    }

    pub fn duration(&self) -> FrameTime {
        self.producer.duration()
    }

    /// First frame after the item.
    pub fn end(&self) -> FrameTime {
        self.position + self.duration()
    }

    pub fn is_valid(&self) -> bool {
        self.producer.is_valid()
    }

    pub fn extent(&self) -> Extent {
        Extent {
            position: self.position,
            in_point: self.in_point(),
            out_point: self.out_point(),
        }
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id,
            kind: self.kind,
            extent: self.extent(),
            producer: self.producer.clone(),
        }
    }

    pub(crate) fn set_position(&mut self, position: FrameTime) {
        self.position = position;
    }

    pub(crate) fn set_track(&mut self, track: Option<TrackId>) {
        self.track = track;
    }

    pub(crate) fn set_range(&mut self, in_point: FrameTime, out_point: FrameTime) {
        self.producer.set_in_and_out(in_point, out_point);
    }
}

/// Position plus source range; everything a resize can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub position: FrameTime,
    pub in_point: FrameTime,
    pub out_point: FrameTime,
}

impl Extent {
    pub fn duration(&self) -> FrameTime {
        self.out_point - self.in_point
    }

    pub fn end(&self) -> FrameTime {
        self.position + self.duration()
    }
}

/// Everything needed to put a removed item back with the same id.
#[derive(Debug, Clone)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub kind: ItemKind,
    pub extent: Extent,
    pub producer: Arc<dyn Producer>,
}

impl ItemSnapshot {
    pub fn restore(&self) -> MoveableItem {
        self.producer
            .set_in_and_out(self.extent.in_point, self.extent.out_point);

        let mut item = MoveableItem::new(self.id, self.kind, self.producer.clone());
        item.set_position(self.extent.position);
        item
    }
}
