use cutline_api::timeline::{
    GroupId, GroupMember, ItemId, Placement, TimelineEvent, TrackFlags, TrackId, TrackKind,
};
use cutline_api::undo::Direction;
use cutline_api::{Error, FrameTime, Result};
use cutline_core::collections::ImVec;

use super::Timeline;
use crate::item::{Extent, ItemSnapshot, MoveableItem};
use crate::track::Track;

/// An empty track as it is recreated by undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub kind: TrackKind,
    pub name: String,
    pub flags: TrackFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemMove {
    pub item: ItemId,
    pub from: Placement,
    pub to: Placement,
}

/// Reversible primitive on a timeline. Each variant carries both sides of
/// the change so it can be applied in either direction.
#[derive(Debug, Clone)]
pub enum TimelineCommand {
    InsertTrack {
        track: TrackSnapshot,
        index: usize,
    },
    RemoveTrack {
        track: TrackSnapshot,
        index: usize,
    },
    SetTrackFlags {
        track: TrackId,
        before: TrackFlags,
        after: TrackFlags,
    },
    InsertItem {
        track: TrackId,
        item: ItemSnapshot,
    },
    RemoveItem {
        track: TrackId,
        item: ItemSnapshot,
    },
    /// Moves every listed item at once: all are lifted before any is put
    /// down, so members of a group may pass through each other's slots.
    MoveItems {
        moves: Vec<ItemMove>,
    },
    ResizeItem {
        item: ItemId,
        before: Extent,
        after: Extent,
    },
    CreateGroup {
        group: GroupId,
        members: Vec<GroupMember>,
        parent: Option<GroupId>,
    },
    DissolveGroup {
        group: GroupId,
        members: Vec<GroupMember>,
        parent: Option<GroupId>,
    },
    AttachMember {
        member: GroupMember,
        group: GroupId,
    },
    DetachMember {
        member: GroupMember,
        group: GroupId,
    },
}

impl Timeline {
    /// Applies a primitive in `direction`. A failing primitive leaves the
    /// timeline unchanged.
    pub fn apply(&mut self, command: &TimelineCommand, direction: Direction) -> Result<()> {
        use Direction::{Backward, Forward};
        use TimelineCommand::*;

        let result = match (command, direction) {
            (InsertTrack { track, index }, Forward) | (RemoveTrack { track, index }, Backward) => {
                self.attach_track(track, *index)
            }
            (RemoveTrack { track, .. }, Forward) | (InsertTrack { track, .. }, Backward) => {
                self.detach_track(track.id)
            }
            (SetTrackFlags { track, before, after }, _) => {
                self.write_track_flags(*track, pick(direction, *before, *after))
            }
            (InsertItem { track, item }, Forward) | (RemoveItem { track, item }, Backward) => {
                self.attach_item(*track, item)
            }
            (RemoveItem { item, .. }, Forward) | (InsertItem { item, .. }, Backward) => {
                self.detach_item(item.id).map(drop)
            }
            (MoveItems { moves }, _) => self.relocate(moves, direction),
            (ResizeItem { item, before, after }, _) => {
                self.write_extent(*item, pick(direction, *before, *after))
            }
            (
                CreateGroup {
                    group,
                    members,
                    parent,
                },
                Forward,
            )
            | (
                DissolveGroup {
                    group,
                    members,
                    parent,
                },
                Backward,
            ) => self.form_group(*group, members, *parent),
            (DissolveGroup { group, .. }, Forward) | (CreateGroup { group, .. }, Backward) => {
                self.break_group(*group)
            }
            (AttachMember { member, group }, Forward)
            | (DetachMember { member, group }, Backward) => self.join_group(*member, *group),
            (DetachMember { member, group }, Forward)
            | (AttachMember { member, group }, Backward) => self.leave_group(*member, *group),
        };

        match &result {
            Ok(()) => self.refresh_duration(),
            Err(error) if error.is_invariant_violation() => {
                tracing::error!(?error, ?command, ?direction, "timeline command failed")
            }
            Err(error) => tracing::debug!(?error, "timeline command rejected"),
        }

        result
    }

    fn attach_track(&mut self, snapshot: &TrackSnapshot, index: usize) -> Result<()> {
        if index > self.track_order.len() {
            return Err(Error::OutOfRange);
        }

        if self.tracks.contains_key(&snapshot.id) {
            return Err(Error::new_internal(format!(
                "track {} already exists",
                snapshot.id
            )));
        }

        let mut track = Track::new(snapshot.id, snapshot.kind, snapshot.name.clone());
        track.set_flags(snapshot.flags);
        self.tracks.insert(snapshot.id, track);
        self.track_order.insert(index, snapshot.id);

        self.subscribers.notify(
            (),
            TimelineEvent::TrackInserted {
                id: snapshot.id,
                index,
            },
        );

        Ok(())
    }

    fn detach_track(&mut self, id: TrackId) -> Result<()> {
        let track = self.tracks.get(&id).ok_or(Error::InvalidId)?;
        if !track.is_empty() {
            return Err(Error::new_internal(format!("track {id} is not empty")));
        }

        self.tracks.remove(&id);
        self.track_order.retain(|&t| t != id);
        self.subscribers
            .notify((), TimelineEvent::TrackRemoved { id });

        Ok(())
    }

    fn write_track_flags(&mut self, id: TrackId, flags: TrackFlags) -> Result<()> {
        let track = self.tracks.get_mut(&id).ok_or(Error::InvalidId)?;
        track.set_flags(flags);
        self.subscribers
            .notify((), TimelineEvent::TrackFlagsChanged { id, flags });
        Ok(())
    }

    fn attach_item(&mut self, track_id: TrackId, snapshot: &ItemSnapshot) -> Result<()> {
        if self.item_tracks.contains_key(&snapshot.id) {
            return Err(Error::new_internal(format!(
                "item {} is already placed",
                snapshot.id
            )));
        }

        let track = self.tracks.get_mut(&track_id).ok_or(Error::InvalidId)?;
        if !track
            .lane(snapshot.kind)
            .is_free(snapshot.extent.position, snapshot.extent.end(), |_| false)
        {
            return Err(Error::Collision);
        }

        track.insert(snapshot.restore(), snapshot.extent.position)?;
        self.item_tracks.insert(snapshot.id, track_id);
        self.add_edges(snapshot.extent.position, snapshot.extent.end());

        self.subscribers.notify(
            (),
            TimelineEvent::ItemInserted {
                id: snapshot.id,
                track: track_id,
                start: snapshot.extent.position,
                end: snapshot.extent.end(),
            },
        );

        Ok(())
    }

    fn detach_item(&mut self, id: ItemId) -> Result<MoveableItem> {
        let track_id = *self.item_tracks.get(&id).ok_or(Error::InvalidId)?;
        let track = self.tracks.get_mut(&track_id).ok_or(Error::InvalidId)?;
        let item = track.remove(id)?;

        self.item_tracks.remove(&id);
        self.remove_edges(item.position(), item.end());
        self.subscribers.notify(
            (),
            TimelineEvent::ItemRemoved {
                id,
                track: track_id,
            },
        );

        Ok(item)
    }

    fn relocate(&mut self, moves: &[ItemMove], direction: Direction) -> Result<()> {
        let moves: Vec<(ItemId, Placement, Placement)> = moves
            .iter()
            .map(|m| match direction {
                Direction::Forward => (m.item, m.from, m.to),
                Direction::Backward => (m.item, m.to, m.from),
            })
            .collect();

        for &(id, from, to) in &moves {
            let item = self.item(id).ok_or(Error::InvalidId)?;
            if item.track() != Some(from.track) || item.position() != from.position {
                return Err(Error::new_internal(format!(
                    "item {id} is not at {from:?}"
                )));
            }

            if !self.tracks.contains_key(&to.track) {
                return Err(Error::InvalidId);
            }
        }

        let mut lifted = Vec::with_capacity(moves.len());
        for &(id, from, to) in &moves {
            let removed = match self.tracks.get_mut(&from.track) {
                Some(track) => track.remove(id),
                None => Err(Error::InvalidId),
            };

            match removed {
                Ok(item) => lifted.push((item, from, to)),
                Err(error) => {
                    self.put_back(Vec::new(), lifted);
                    return Err(error);
                }
            }
        }

        let mut placed = Vec::with_capacity(lifted.len());
        let mut failure = None;
        for (item, _, to) in &lifted {
            let result = match self.tracks.get_mut(&to.track) {
                Some(track) => track.insert(item.clone(), to.position),
                None => Err(Error::InvalidId),
            };

            match result {
                Ok(()) => placed.push((item.id(), to.track)),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        if let Some(error) = failure {
            self.put_back(placed, lifted);
            return Err(error);
        }

        for (item, from, to) in lifted {
            let duration = item.duration();
            self.item_tracks.insert(item.id(), to.track);
            self.remove_edges(from.position, from.position + duration);
            self.add_edges(to.position, to.position + duration);
            self.subscribers.notify(
                (),
                TimelineEvent::ItemMoved {
                    id: item.id(),
                    old: from,
                    new: to,
                },
            );
        }

        Ok(())
    }

    /// Undoes a partially applied relocation.
    fn put_back(
        &mut self,
        placed: Vec<(ItemId, TrackId)>,
        lifted: Vec<(MoveableItem, Placement, Placement)>,
    ) {
        for (id, track) in placed {
            if let Some(track) = self.tracks.get_mut(&track) {
                let _ = track.remove(id);
            }
        }

        for (item, from, _) in lifted {
            let id = item.id();
            let restored = match self.tracks.get_mut(&from.track) {
                Some(track) => track.insert(item, from.position),
                None => Err(Error::InvalidId),
            };

            if let Err(error) = restored {
                tracing::error!(?error, %id, "failed to restore item after aborted move");
            }
        }
    }

    fn write_extent(&mut self, id: ItemId, extent: Extent) -> Result<()> {
        let track_id = *self.item_tracks.get(&id).ok_or(Error::InvalidId)?;
        let track = self.tracks.get_mut(&track_id).ok_or(Error::InvalidId)?;
        let old = track.get(id).ok_or(Error::InvalidId)?.extent();

        track.set_extent(id, extent)?;

        self.remove_edges(old.position, old.end());
        self.add_edges(extent.position, extent.end());
        self.subscribers.notify(
            (),
            TimelineEvent::ItemResized {
                id,
                start: extent.position,
                end: extent.end(),
            },
        );

        Ok(())
    }

    fn form_group(
        &mut self,
        group: GroupId,
        members: &[GroupMember],
        parent: Option<GroupId>,
    ) -> Result<()> {
        for member in members {
            let exists = match member {
                GroupMember::Item(id) => self.item_tracks.contains_key(id),
                GroupMember::Group(id) => self.groups.contains(*id),
            };

            if !exists {
                return Err(Error::InvalidId);
            }
        }

        self.groups.create(group, members, parent)?;
        self.notify_group(group);
        if let Some(parent) = parent {
            self.notify_group(parent);
        }

        Ok(())
    }

    fn break_group(&mut self, group: GroupId) -> Result<()> {
        let (_, parent) = self.groups.dissolve(group)?;
        self.subscribers.notify(
            (),
            TimelineEvent::GroupChanged {
                id: group,
                members: ImVec::new(),
            },
        );
        if let Some(parent) = parent {
            self.notify_group(parent);
        }

        Ok(())
    }

    fn join_group(&mut self, member: GroupMember, group: GroupId) -> Result<()> {
        self.groups.attach(member, group)?;
        self.notify_group(group);
        Ok(())
    }

    fn leave_group(&mut self, member: GroupMember, group: GroupId) -> Result<()> {
        self.groups.detach(member, group)?;
        self.notify_group(group);
        Ok(())
    }

    fn notify_group(&mut self, group: GroupId) {
        let members: ImVec<GroupMember> = self
            .groups
            .members(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default();

        self.subscribers
            .notify((), TimelineEvent::GroupChanged { id: group, members });
    }

    fn add_edges(&self, start: FrameTime, end: FrameTime) {
        self.snaps.add_point(start);
        self.snaps.add_point(end);
    }

    fn remove_edges(&self, start: FrameTime, end: FrameTime) {
        self.snaps.remove_point(start);
        self.snaps.remove_point(end);
    }

    fn refresh_duration(&mut self) {
        let duration = self.duration();
        if duration != self.last_duration {
            self.last_duration = duration;
            self.subscribers
                .notify((), TimelineEvent::DurationChanged { duration });
        }
    }
}

fn pick<T>(direction: Direction, before: T, after: T) -> T {
    match direction {
        Direction::Forward => after,
        Direction::Backward => before,
    }
}
