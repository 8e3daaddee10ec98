#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use cutline_api::timeline::{ItemId, ItemKind, TrackFlags, TrackId, TrackKind};
use cutline_api::{Error, FrameTime, Result};
use cutline_core::collections::HashMap;

use crate::item::{Extent, MoveableItem};

/// Non-overlapping, position-ordered run of items. Adjacent items may
/// touch: an item ending at frame `n` and one starting at `n` coexist.
#[derive(Debug, Clone, Default)]
pub struct Lane {
    items: HashMap<ItemId, MoveableItem>,
    item_starts: BTreeSet<(FrameTime, ItemId)>,
}

impl Lane {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn get(&self, id: ItemId) -> Option<&MoveableItem> {
        self.items.get(&id)
    }

    /// Items in position order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &MoveableItem> + '_ {
        self.item_starts.iter().map(|(_, id)| &self.items[id])
    }

    /// Items overlapping `[start, end)`, in position order.
    pub fn range(
        &self,
        start: FrameTime,
        end: FrameTime,
    ) -> impl Iterator<Item = &MoveableItem> + '_ {
        let first = self
            .item_at(start)
            .map_or(start, |item| item.position());

        self.item_starts
            .range((first, ItemId::MIN)..)
            .map(|(_, id)| &self.items[id])
            .take_while(move |item| item.position() < end)
    }

    /// Item covering `frame`, if any.
    pub fn item_at(&self, frame: FrameTime) -> Option<&MoveableItem> {
        let (_, id) = self.item_starts.range(..=(frame, ItemId::MAX)).next_back()?;
        let item = &self.items[id];
        (item.end() > frame).then_some(item)
    }

    /// Whether `[start, end)` is free, not counting items `ignore` accepts.
    pub fn is_free(
        &self,
        start: FrameTime,
        end: FrameTime,
        ignore: impl Fn(ItemId) -> bool,
    ) -> bool {
        for (_, id) in self.item_starts.range(..(end, ItemId::MIN)).rev() {
            if ignore(*id) {
                continue;
            }

            // Stored items never overlap, so the first one ending at or
            // before `start` shadows everything earlier.
            return self.items[id].end() <= start;
        }

        true
    }

    /// End of the last item, or zero for an empty lane.
    pub fn end(&self) -> FrameTime {
        self.iter().next_back().map_or(FrameTime::ZERO, MoveableItem::end)
    }

    /// First uncovered frame at or after `frame`.
    pub fn next_blank(&self, frame: FrameTime) -> FrameTime {
        let mut frame = frame;
        while let Some(item) = self.item_at(frame) {
            frame = item.end();
        }
        frame
    }

    /// Last uncovered non-negative frame before `frame`.
    pub fn previous_blank(&self, frame: FrameTime) -> Option<FrameTime> {
        let mut frame = frame - 1;
        while frame >= FrameTime::ZERO {
            match self.item_at(frame) {
                Some(item) => frame = item.position() - 1,
                None => return Some(frame),
            }
        }
        None
    }

    /// Length of the gap starting at `frame`, `None` if `frame` is covered
    /// and `FrameTime::MAX` if nothing follows.
    pub fn blank_length_at(&self, frame: FrameTime) -> Option<FrameTime> {
        if self.item_at(frame).is_some() {
            return None;
        }

        let next = self
            .item_starts
            .range((frame, ItemId::MIN)..)
            .next()
            .map(|&(start, _)| start);

        Some(next.map_or(FrameTime::MAX, |start| start - frame))
    }

    pub(crate) fn insert(&mut self, mut item: MoveableItem, position: FrameTime) -> Result<()> {
        if item.duration() <= FrameTime::ZERO {
            return Err(Error::EmptyRange);
        }

        if self.items.contains_key(&item.id()) {
            return Err(Error::new_internal(format!("item {} already on lane", item.id())));
        }

        if !self.is_free(position, position + item.duration(), |_| false) {
            return Err(Error::Collision);
        }

        item.set_position(position);
        self.item_starts.insert((position, item.id()));
        self.items.insert(item.id(), item);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: ItemId) -> Result<MoveableItem> {
        let item = self.items.remove(&id).ok_or(Error::InvalidId)?;
        self.item_starts.remove(&(item.position(), id));
        Ok(item)
    }

    /// Moves an item within the lane. On collision the lane is untouched.
    pub(crate) fn move_item(&mut self, id: ItemId, position: FrameTime) -> Result<()> {
        let item = self.items.get(&id).ok_or(Error::InvalidId)?;
        let old = item.position();
        if !self.is_free(position, position + item.duration(), |other| other == id) {
            return Err(Error::Collision);
        }

        self.item_starts.remove(&(old, id));
        self.item_starts.insert((position, id));
        if let Some(item) = self.items.get_mut(&id) {
            item.set_position(position);
        }

        Ok(())
    }

    /// Changes position and source range together.
    pub(crate) fn set_extent(&mut self, id: ItemId, extent: Extent) -> Result<()> {
        if extent.out_point <= extent.in_point {
            return Err(Error::EmptyRange);
        }

        let item = self.items.get(&id).ok_or(Error::InvalidId)?;
        let old = item.position();
        if !self.is_free(extent.position, extent.end(), |other| other == id) {
            return Err(Error::Collision);
        }

        self.item_starts.remove(&(old, id));
        self.item_starts.insert((extent.position, id));
        if let Some(item) = self.items.get_mut(&id) {
            item.set_position(extent.position);
            item.set_range(extent.in_point, extent.out_point);
        }

        Ok(())
    }
}

/// A timeline lane pair: clips and compositions never collide with each
/// other, only with items of their own kind.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    pub name: String,
    kind: TrackKind,
    flags: TrackFlags,
    clips: Lane,
    compositions: Lane,
}

impl Track {
    pub fn new(id: TrackId, kind: TrackKind, name: String) -> Track {
        Track {
            id,
            name,
            kind,
            flags: TrackFlags {
                active: true,
                ..TrackFlags::default()
            },
            clips: Lane::default(),
            compositions: Lane::default(),
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn flags(&self) -> TrackFlags {
        self.flags
    }

    pub fn is_locked(&self) -> bool {
        self.flags.locked
    }

    pub(crate) fn set_flags(&mut self, flags: TrackFlags) {
        self.flags = flags;
    }

    pub fn clips(&self) -> &Lane {
        &self.clips
    }

    pub fn compositions(&self) -> &Lane {
        &self.compositions
    }

    pub fn lane(&self, kind: ItemKind) -> &Lane {
        match kind {
            ItemKind::Clip => &self.clips,
            ItemKind::Composition => &self.compositions,
        }
    }

    fn lane_mut(&mut self, kind: ItemKind) -> &mut Lane {
        match kind {
            ItemKind::Clip => &mut self.clips,
            ItemKind::Composition => &mut self.compositions,
        }
    }

    pub fn len(&self) -> usize {
        self.clips.len() + self.compositions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty() && self.compositions.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.clips.contains(id) || self.compositions.contains(id)
    }

    pub fn get(&self, id: ItemId) -> Option<&MoveableItem> {
        self.clips.get(id).or_else(|| self.compositions.get(id))
    }

    /// Clips then compositions, each in position order.
    pub fn items(&self) -> impl Iterator<Item = &MoveableItem> + '_ {
        self.clips.iter().chain(self.compositions.iter())
    }

    pub fn item_at(&self, frame: FrameTime) -> Option<&MoveableItem> {
        self.clips.item_at(frame)
    }

    pub fn next_blank(&self, frame: FrameTime) -> FrameTime {
        self.clips.next_blank(frame)
    }

    pub fn previous_blank(&self, frame: FrameTime) -> Option<FrameTime> {
        self.clips.previous_blank(frame)
    }

    pub fn end(&self) -> FrameTime {
        self.clips.end().max(self.compositions.end())
    }

    pub(crate) fn insert(&mut self, mut item: MoveableItem, position: FrameTime) -> Result<()> {
        item.set_track(Some(self.id));
        self.lane_mut(item.kind()).insert(item, position)
    }

    pub(crate) fn remove(&mut self, id: ItemId) -> Result<MoveableItem> {
        let kind = self.get(id).ok_or(Error::InvalidId)?.kind();
        let mut item = self.lane_mut(kind).remove(id)?;
        item.set_track(None);
        Ok(item)
    }

    pub(crate) fn move_item(&mut self, id: ItemId, position: FrameTime) -> Result<()> {
        let kind = self.get(id).ok_or(Error::InvalidId)?.kind();
        self.lane_mut(kind).move_item(id, position)
    }

    pub(crate) fn set_extent(&mut self, id: ItemId, extent: Extent) -> Result<()> {
        let kind = self.get(id).ok_or(Error::InvalidId)?.kind();
        self.lane_mut(kind).set_extent(id, extent)
    }
}
