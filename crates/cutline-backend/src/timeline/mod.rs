mod apply;
mod groups;
mod ops;

use std::sync::{Arc, Weak};

use async_channel::Receiver;
use cutline_api::marker::MarkerOwner;
use cutline_api::timeline::{GroupId, GroupMember, ItemId, TimelineEvent, TimelineId, TrackId};
use cutline_api::{Error, FrameRate, FrameTime, ProjectConfig, Result};
use cutline_core::collections::HashMap;
use parking_lot::RwLock;

pub use self::apply::{ItemMove, TimelineCommand, TrackSnapshot};
pub use self::groups::Groups;
use crate::item::MoveableItem;
use crate::marker::MarkerList;
use crate::snap::{SnapConsumer, SnapRegistry};
use crate::subscribers::Subscribers;
use crate::track::Track;
use crate::undo::UndoStack;

/// Tracks, items, groups and guides of one sequence, kept consistent as a
/// unit. All mutation goes through `request_*` operations, which record
/// their inverse on the undo stack.
pub struct Timeline {
    id: TimelineId,
    fps: FrameRate,
    tracks: HashMap<TrackId, Track>,
    track_order: Vec<TrackId>,
    item_tracks: HashMap<ItemId, TrackId>,
    groups: Groups,
    guides: Arc<RwLock<MarkerList>>,
    snaps: Arc<SnapRegistry>,
    undo: Arc<UndoStack>,
    subscribers: Subscribers<(), TimelineEvent>,
    last_duration: FrameTime,
}

impl Timeline {
    /// Creates a timeline with its guide list, feeding clip edges and guides
    /// into `snaps`, and registers both as undo targets.
    pub fn new_shared(
        id: TimelineId,
        config: &ProjectConfig,
        undo: &Arc<UndoStack>,
        snaps: Arc<SnapRegistry>,
    ) -> Arc<RwLock<Timeline>> {
        let guides = MarkerList::new_shared(
            MarkerOwner::Timeline(id),
            config.default_marker_type,
            undo,
        );

        let consumer: Weak<dyn SnapConsumer> = Arc::downgrade(&snaps) as Weak<SnapRegistry>;
        guides.write().register_snap_consumer(consumer);

        let timeline = Arc::new(RwLock::new(Timeline {
            id,
            fps: config.fps,
            tracks: HashMap::default(),
            track_order: Vec::new(),
            item_tracks: HashMap::default(),
            groups: Groups::default(),
            guides,
            snaps,
            undo: undo.clone(),
            subscribers: Subscribers::new(),
            last_duration: FrameTime::ZERO,
        }));

        undo.register_timeline(id, Arc::downgrade(&timeline));
        timeline
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    pub fn fps(&self) -> FrameRate {
        self.fps
    }

    /// Nearest frame to `secs` at this timeline's rate.
    pub fn time_from_secs(&self, secs: f64) -> FrameTime {
        FrameTime::from_secs(secs, self.fps)
    }

    /// Converts a frame count expressed at `rate` into this timeline's rate.
    pub fn time_from_rate(&self, frames: i64, rate: FrameRate) -> FrameTime {
        FrameTime::from_frames(frames).rescale(rate, self.fps)
    }

    pub fn guides(&self) -> &Arc<RwLock<MarkerList>> {
        &self.guides
    }

    pub fn snaps(&self) -> &Arc<SnapRegistry> {
        &self.snaps
    }

    pub fn undo_stack(&self) -> &Arc<UndoStack> {
        &self.undo
    }

    pub fn subscribe(&mut self) -> Receiver<TimelineEvent> {
        self.subscribers.subscribe(())
    }

    pub fn track_ids(&self) -> &[TrackId] {
        &self.track_order
    }

    pub fn track_count(&self) -> usize {
        self.track_order.len()
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.track_order.iter().position(|&t| t == id)
    }

    pub fn item(&self, id: ItemId) -> Option<&MoveableItem> {
        let track = self.item_tracks.get(&id)?;
        self.tracks.get(track)?.get(id)
    }

    pub fn item_track(&self, id: ItemId) -> Option<TrackId> {
        self.item_tracks.get(&id).copied()
    }

    pub fn item_count(&self) -> usize {
        self.item_tracks.len()
    }

    /// Every item, track by track in display order.
    pub fn items(&self) -> impl Iterator<Item = &MoveableItem> + '_ {
        self.track_order
            .iter()
            .filter_map(|id| self.tracks.get(id))
            .flat_map(Track::items)
    }

    pub fn groups(&self) -> &Groups {
        &self.groups
    }

    pub fn group_of(&self, member: impl Into<GroupMember>) -> Option<GroupId> {
        self.groups.parent(member.into())
    }

    /// Topmost group containing `member`, if it is grouped at all.
    pub fn root_group(&self, member: impl Into<GroupMember>) -> Option<GroupId> {
        match self.groups.root(member.into()) {
            GroupMember::Group(id) => Some(id),
            GroupMember::Item(_) => None,
        }
    }

    pub fn group_members(&self, group: GroupId) -> Option<Vec<GroupMember>> {
        self.groups
            .members(group)
            .map(|members| members.iter().copied().collect())
    }

    pub fn leaves(&self, member: impl Into<GroupMember>) -> Vec<ItemId> {
        self.groups.leaves(member.into())
    }

    /// End of the last item on any track.
    pub fn duration(&self) -> FrameTime {
        self.tracks
            .values()
            .map(Track::end)
            .max()
            .unwrap_or(FrameTime::ZERO)
    }

    /// Cross-checks the id index, the track contents and the group tree.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = 0;
        for (&track_id, track) in &self.tracks {
            for item in track.items() {
                seen += 1;
                if self.item_tracks.get(&item.id()) != Some(&track_id)
                    || item.track() != Some(track_id)
                {
                    return Err(Error::new_internal(format!(
                        "item {} not indexed on track {track_id}",
                        item.id()
                    )));
                }
            }

            for lane in [track.clips(), track.compositions()] {
                let mut end = FrameTime::MIN;
                for item in lane.iter() {
                    if item.position() < end {
                        return Err(Error::new_internal(format!(
                            "item {} overlaps on track {track_id}",
                            item.id()
                        )));
                    }
                    end = item.end();
                }
            }
        }

        if seen != self.item_tracks.len() || self.track_order.len() != self.tracks.len() {
            return Err(Error::new_internal("stale index entries"));
        }

        self.groups.check()
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("id", &self.id)
            .field("tracks", &self.track_order)
            .field("items", &self.item_tracks.len())
            .field("groups", &self.groups.len())
            .finish()
    }
}
