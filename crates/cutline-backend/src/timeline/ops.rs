use std::sync::Arc;

use cutline_api::marker::MarkerOwner;
use cutline_api::media::Producer;
use cutline_api::timeline::{
    GroupId, GroupMember, ItemId, ItemKind, Placement, TrackFlags, TrackId, TrackKind,
};
use cutline_api::undo::Direction;
use cutline_api::{Error, FrameTime, Result};
use tracing::instrument;

use super::{ItemMove, Timeline, TimelineCommand, TrackSnapshot};
use crate::item::{Extent, ItemSnapshot};
use crate::undo::{Command, Transaction};

fn noun(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Clip => "clip",
        ItemKind::Composition => "composition",
    }
}

impl Timeline {
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_track_insertion(
        &mut self,
        index: usize,
        kind: TrackKind,
        name: impl Into<String>,
    ) -> Result<TrackId> {
        let mut tx = Transaction::new();
        let id = self.request_track_insertion_in(&mut tx, index, kind, name)?;
        self.push_undo("Insert track", tx);
        Ok(id)
    }

    pub fn request_track_insertion_in(
        &mut self,
        tx: &mut Transaction,
        index: usize,
        kind: TrackKind,
        name: impl Into<String>,
    ) -> Result<TrackId> {
        if index > self.track_order.len() {
            return Err(Error::OutOfRange);
        }

        let track = TrackSnapshot {
            id: TrackId::new(),
            kind,
            name: name.into(),
            flags: TrackFlags {
                active: true,
                ..TrackFlags::default()
            },
        };

        let id = track.id;
        self.run(tx, TimelineCommand::InsertTrack { track, index })?;
        Ok(id)
    }

    /// Deletes a track together with everything on it.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_track_deletion(&mut self, track: TrackId) -> Result<()> {
        let mut tx = Transaction::new();
        self.request_track_deletion_in(&mut tx, track)?;
        self.push_undo("Delete track", tx);
        Ok(())
    }

    pub fn request_track_deletion_in(&mut self, tx: &mut Transaction, id: TrackId) -> Result<()> {
        let index = self.track_index(id).ok_or(Error::InvalidId)?;
        let track = self.tracks.get(&id).ok_or(Error::InvalidId)?;
        if track.is_locked() {
            return Err(Error::TrackLocked);
        }

        let snapshot = TrackSnapshot {
            id,
            kind: track.kind(),
            name: track.name.clone(),
            flags: track.flags(),
        };
        let items: Vec<ItemId> = track.items().map(|item| item.id()).collect();

        self.atomic(tx, |this, tx| {
            for item in items {
                this.delete_item(tx, item)?;
            }

            this.run(
                tx,
                TimelineCommand::RemoveTrack {
                    track: snapshot,
                    index,
                },
            )
        })
    }

    #[instrument(level = "trace", skip_all, err)]
    pub fn request_track_lock(&mut self, track: TrackId, locked: bool) -> Result<()> {
        let flags = TrackFlags {
            locked,
            ..self.track(track).ok_or(Error::InvalidId)?.flags()
        };

        let name = if locked { "Lock track" } else { "Unlock track" };
        let mut tx = Transaction::new();
        self.request_track_flags_in(&mut tx, track, flags)?;
        self.push_undo(name, tx);
        Ok(())
    }

    pub fn request_track_flags_in(
        &mut self,
        tx: &mut Transaction,
        track: TrackId,
        flags: TrackFlags,
    ) -> Result<()> {
        let before = self.track(track).ok_or(Error::InvalidId)?.flags();
        if before == flags {
            return Ok(());
        }

        let command = TimelineCommand::SetTrackFlags {
            track,
            before,
            after: flags,
        };
        self.run(tx, command)
    }

    /// Places a clip backed by `producer`. `id` is given when rebuilding
    /// a saved document; otherwise a fresh id is minted.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_clip_insertion(
        &mut self,
        track: TrackId,
        position: FrameTime,
        producer: Arc<dyn Producer>,
        id: Option<ItemId>,
    ) -> Result<ItemId> {
        let mut tx = Transaction::new();
        let id = self.request_item_insertion_in(
            &mut tx,
            ItemKind::Clip,
            track,
            position,
            producer,
            id,
        )?;
        self.push_undo("Insert clip", tx);
        Ok(id)
    }

    #[instrument(level = "trace", skip_all, err)]
    pub fn request_composition_insertion(
        &mut self,
        track: TrackId,
        position: FrameTime,
        producer: Arc<dyn Producer>,
        id: Option<ItemId>,
    ) -> Result<ItemId> {
        let mut tx = Transaction::new();
        let id = self.request_item_insertion_in(
            &mut tx,
            ItemKind::Composition,
            track,
            position,
            producer,
            id,
        )?;
        self.push_undo("Insert composition", tx);
        Ok(id)
    }

    pub fn request_item_insertion_in(
        &mut self,
        tx: &mut Transaction,
        kind: ItemKind,
        track: TrackId,
        position: FrameTime,
        producer: Arc<dyn Producer>,
        id: Option<ItemId>,
    ) -> Result<ItemId> {
        if !producer.is_valid() {
            return Err(Error::InvalidProducer);
        }

        if producer.duration() <= FrameTime::ZERO {
            return Err(Error::EmptyRange);
        }

        if position < FrameTime::ZERO {
            return Err(Error::OutOfRange);
        }

        let target = self.tracks.get(&track).ok_or(Error::InvalidId)?;
        if target.is_locked() {
            return Err(Error::TrackLocked);
        }

        let id = id.unwrap_or_else(ItemId::new);
        if self.item_tracks.contains_key(&id) {
            tracing::error!(%id, "item id already in use");
            return Err(Error::InvalidId);
        }

        // The item owns its range, so it gets a cut of its own.
        let (in_point, out_point) = (producer.get_in(), producer.get_out());
        let item = ItemSnapshot {
            id,
            kind,
            extent: Extent {
                position,
                in_point,
                out_point,
            },
            producer: producer.cut(in_point, out_point),
        };

        if !target
            .lane(kind)
            .is_free(position, item.extent.end(), |_| false)
        {
            return Err(Error::Collision);
        }

        self.run(tx, TimelineCommand::InsertItem { track, item })?;
        Ok(id)
    }

    /// Moves an item, and the whole group it belongs to, so that the item
    /// lands at `position` on `track`. Other members keep their offset in
    /// time and in track index. Either everything moves or nothing does.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_item_move(
        &mut self,
        item: ItemId,
        track: TrackId,
        position: FrameTime,
    ) -> Result<()> {
        let name = match self.root_group(item) {
            Some(_) => "Move group".to_owned(),
            None => {
                let kind = self.item(item).ok_or(Error::InvalidId)?.kind();
                format!("Move {}", noun(kind))
            }
        };

        let mut tx = Transaction::new();
        self.request_item_move_in(&mut tx, item, track, position)?;
        self.push_undo(name, tx);
        Ok(())
    }

    pub fn request_item_move_in(
        &mut self,
        tx: &mut Transaction,
        item: ItemId,
        track: TrackId,
        position: FrameTime,
    ) -> Result<()> {
        let source = self.item(item).ok_or(Error::InvalidId)?;
        let delta = position - source.position();
        let source_index = self
            .item_track(item)
            .and_then(|t| self.track_index(t))
            .ok_or(Error::InvalidId)?;
        let target_index = self.track_index(track).ok_or(Error::InvalidId)?;
        let shift = target_index as isize - source_index as isize;

        let root = self.groups.root(GroupMember::Item(item));
        let mut moves = Vec::new();

        for leaf in self.groups.leaves(root) {
            let member = self.item(leaf).ok_or(Error::InvalidId)?;
            let from_track = member.track().ok_or(Error::InvalidId)?;
            let from_index = self.track_index(from_track).ok_or(Error::InvalidId)?;

            let to_index = from_index as isize + shift;
            let to_track = usize::try_from(to_index)
                .ok()
                .and_then(|i| self.track_order.get(i).copied())
                .ok_or(Error::OutOfRange)?;

            let locked = |id: TrackId| self.tracks.get(&id).is_some_and(|t| t.is_locked());
            if locked(from_track) || locked(to_track) {
                return Err(Error::TrackLocked);
            }

            let to_position = member.position() + delta;
            if to_position < FrameTime::ZERO {
                return Err(Error::OutOfRange);
            }

            moves.push(ItemMove {
                item: leaf,
                from: Placement {
                    track: from_track,
                    position: member.position(),
                },
                to: Placement {
                    track: to_track,
                    position: to_position,
                },
            });
        }

        if moves.iter().all(|m| m.from == m.to) {
            return Ok(());
        }

        self.run(tx, TimelineCommand::MoveItems { moves })
    }

    /// Sets the source range of an item. A pure left trim (only `in_point`
    /// changes) keeps the right edge in place by shifting the position.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_item_resize(
        &mut self,
        item: ItemId,
        in_point: FrameTime,
        out_point: FrameTime,
    ) -> Result<()> {
        let kind = self.item(item).ok_or(Error::InvalidId)?.kind();
        let mut tx = Transaction::new();
        self.request_item_resize_in(&mut tx, item, in_point, out_point)?;
        self.push_undo(format!("Resize {}", noun(kind)), tx);
        Ok(())
    }

    pub fn request_item_resize_in(
        &mut self,
        tx: &mut Transaction,
        item: ItemId,
        in_point: FrameTime,
        out_point: FrameTime,
    ) -> Result<()> {
        if out_point <= in_point {
            return Err(Error::EmptyRange);
        }

        if in_point < FrameTime::ZERO {
            return Err(Error::OutOfRange);
        }

        let current = self.item(item).ok_or(Error::InvalidId)?;
        let track = self
            .tracks
            .get(&current.track().ok_or(Error::InvalidId)?)
            .ok_or(Error::InvalidId)?;
        if track.is_locked() {
            return Err(Error::TrackLocked);
        }

        let before = current.extent();
        let position = if out_point == before.out_point && in_point != before.in_point {
            before.position + (in_point - before.in_point)
        } else {
            before.position
        };

        if position < FrameTime::ZERO {
            return Err(Error::OutOfRange);
        }

        let after = Extent {
            position,
            in_point,
            out_point,
        };

        if after == before {
            return Ok(());
        }

        if !track
            .lane(current.kind())
            .is_free(after.position, after.end(), |other| other == item)
        {
            return Err(Error::Collision);
        }

        self.run(
            tx,
            TimelineCommand::ResizeItem {
                item,
                before,
                after,
            },
        )
    }

    /// Removes an item. Leaving its group empties and dissolves that group,
    /// and so on up the tree.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_item_deletion(&mut self, item: ItemId) -> Result<()> {
        let kind = self.item(item).ok_or(Error::InvalidId)?.kind();
        let mut tx = Transaction::new();
        self.request_item_deletion_in(&mut tx, item)?;
        self.push_undo(format!("Delete {}", noun(kind)), tx);
        Ok(())
    }

    pub fn request_item_deletion_in(&mut self, tx: &mut Transaction, item: ItemId) -> Result<()> {
        self.atomic(tx, |this, tx| this.delete_item(tx, item))
    }

    /// Splits an item at `frame`. The right part gets a new id and joins
    /// the left part's group.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_clip_cut(&mut self, item: ItemId, frame: FrameTime) -> Result<ItemId> {
        let mut tx = Transaction::new();
        let id = self.request_clip_cut_in(&mut tx, item, frame)?;
        self.push_undo("Cut clip", tx);
        Ok(id)
    }

    pub fn request_clip_cut_in(
        &mut self,
        tx: &mut Transaction,
        item: ItemId,
        frame: FrameTime,
    ) -> Result<ItemId> {
        let current = self.item(item).ok_or(Error::InvalidId)?;
        let track = current.track().ok_or(Error::InvalidId)?;
        if self.tracks.get(&track).is_some_and(|t| t.is_locked()) {
            return Err(Error::TrackLocked);
        }

        if frame <= current.position() || frame >= current.end() {
            return Err(Error::OutOfRange);
        }

        let before = current.extent();
        let cut_point = before.in_point + (frame - before.position);
        let left = Extent {
            out_point: cut_point,
            ..before
        };
        let right = ItemSnapshot {
            id: ItemId::new(),
            kind: current.kind(),
            extent: Extent {
                position: frame,
                in_point: cut_point,
                out_point: before.out_point,
            },
            producer: current.producer().cut(cut_point, before.out_point),
        };
        let parent = self.groups.parent(GroupMember::Item(item));

        self.atomic(tx, |this, tx| {
            let id = right.id;
            this.run(
                tx,
                TimelineCommand::ResizeItem {
                    item,
                    before,
                    after: left,
                },
            )?;
            this.run(tx, TimelineCommand::InsertItem { track, item: right })?;

            if let Some(group) = parent {
                let member = GroupMember::Item(id);
                this.run(tx, TimelineCommand::AttachMember { member, group })?;
            }

            Ok(id)
        })
    }

    /// Groups the topmost groups of `items`. Items already sharing a root
    /// count once; at least two distinct roots are needed.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_group_create(&mut self, items: &[ItemId]) -> Result<GroupId> {
        let mut tx = Transaction::new();
        let group = self.request_group_create_in(&mut tx, items)?;
        self.push_undo("Group clips", tx);
        Ok(group)
    }

    pub fn request_group_create_in(
        &mut self,
        tx: &mut Transaction,
        items: &[ItemId],
    ) -> Result<GroupId> {
        let mut roots = Vec::new();
        for &item in items {
            if !self.item_tracks.contains_key(&item) {
                return Err(Error::InvalidId);
            }

            let root = self.groups.root(GroupMember::Item(item));
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        if roots.len() < 2 {
            return Err(Error::GroupTooSmall);
        }

        let group = GroupId::new();
        self.run(
            tx,
            TimelineCommand::CreateGroup {
                group,
                members: roots,
                parent: None,
            },
        )?;

        Ok(group)
    }

    /// Removes one level of grouping. Nested groups stay intact and move
    /// up to the dissolved group's parent.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_group_dissolve(&mut self, group: GroupId) -> Result<()> {
        let mut tx = Transaction::new();
        self.request_group_dissolve_in(&mut tx, group)?;
        self.push_undo("Ungroup clips", tx);
        Ok(())
    }

    pub fn request_group_dissolve_in(
        &mut self,
        tx: &mut Transaction,
        group: GroupId,
    ) -> Result<()> {
        let members = self.group_members(group).ok_or(Error::InvalidId)?;
        let parent = self.groups.parent(GroupMember::Group(group));

        self.run(
            tx,
            TimelineCommand::DissolveGroup {
                group,
                members,
                parent,
            },
        )
    }

    /// Deletes every item below `group`.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_group_deletion(&mut self, group: GroupId) -> Result<()> {
        let mut tx = Transaction::new();
        self.request_group_deletion_in(&mut tx, group)?;
        self.push_undo("Delete group", tx);
        Ok(())
    }

    pub fn request_group_deletion_in(
        &mut self,
        tx: &mut Transaction,
        group: GroupId,
    ) -> Result<()> {
        if !self.groups.contains(group) {
            return Err(Error::InvalidId);
        }

        let leaves = self.groups.leaves(GroupMember::Group(group));
        self.atomic(tx, |this, tx| {
            for item in leaves {
                this.delete_item(tx, item)?;
            }
            Ok(())
        })
    }

    /// Shifts every item starting at or after `from` by `delta` frames on
    /// `track`, or on every unlocked track when `track` is `None`. With
    /// `move_guides`, guides at or after `from` shift too.
    #[instrument(level = "trace", skip_all, err)]
    pub fn request_spacer_operation(
        &mut self,
        track: Option<TrackId>,
        from: FrameTime,
        delta: i64,
        move_guides: bool,
    ) -> Result<()> {
        let name = if delta >= 0 {
            "Insert space"
        } else {
            "Remove space"
        };

        let mut tx = Transaction::new();
        self.request_spacer_operation_in(&mut tx, track, from, delta, move_guides)?;
        self.push_undo(name, tx);
        Ok(())
    }

    pub fn request_spacer_operation_in(
        &mut self,
        tx: &mut Transaction,
        track: Option<TrackId>,
        from: FrameTime,
        delta: i64,
        move_guides: bool,
    ) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }

        let tracks: Vec<TrackId> = match track {
            Some(id) => {
                if self.tracks.get(&id).ok_or(Error::InvalidId)?.is_locked() {
                    return Err(Error::TrackLocked);
                }
                vec![id]
            }
            None => self
                .track_order
                .iter()
                .copied()
                .filter(|id| self.tracks.get(id).is_some_and(|t| !t.is_locked()))
                .collect(),
        };

        let mut moves = Vec::new();
        for id in tracks {
            let Some(track) = self.tracks.get(&id) else {
                continue;
            };

            for item in track.items().filter(|item| item.position() >= from) {
                let position = item.position() + delta;
                if position < FrameTime::ZERO {
                    return Err(Error::OutOfRange);
                }

                moves.push(ItemMove {
                    item: item.id(),
                    from: Placement {
                        track: id,
                        position: item.position(),
                    },
                    to: Placement { track: id, position },
                });
            }
        }

        self.atomic(tx, |this, tx| {
            if !moves.is_empty() {
                this.run(tx, TimelineCommand::MoveItems { moves })?;
            }

            if move_guides {
                let guides = this.guides.clone();
                let mut guides = guides.write();
                let markers = guides.markers_in_range(from, None);
                guides.move_markers_in(tx, &markers, from, from + delta)?;
            }

            Ok(())
        })
    }

    /// Deletes an item inside an enclosing atomic scope.
    fn delete_item(&mut self, tx: &mut Transaction, item: ItemId) -> Result<()> {
        let track = self.item_track(item).ok_or(Error::InvalidId)?;
        if self.tracks.get(&track).is_some_and(|t| t.is_locked()) {
            return Err(Error::TrackLocked);
        }

        if let Some(group) = self.groups.parent(GroupMember::Item(item)) {
            let member = GroupMember::Item(item);
            self.run(tx, TimelineCommand::DetachMember { member, group })?;
            self.dissolve_emptied(tx, group)?;
        }

        let snapshot = self.item(item).ok_or(Error::InvalidId)?.snapshot();
        self.run(
            tx,
            TimelineCommand::RemoveItem {
                track,
                item: snapshot,
            },
        )
    }

    fn dissolve_emptied(&mut self, tx: &mut Transaction, group: GroupId) -> Result<()> {
        let mut current = Some(group);
        while let Some(group) = current {
            if !self.groups.members(group).is_some_and(|m| m.is_empty()) {
                break;
            }

            let parent = self.groups.parent(GroupMember::Group(group));
            self.run(
                tx,
                TimelineCommand::DissolveGroup {
                    group,
                    members: Vec::new(),
                    parent,
                },
            )?;
            current = parent;
        }

        Ok(())
    }

    /// Runs `f` against a scratch transaction. On failure everything `f`
    /// applied is reverted; on success its commands join `tx`.
    fn atomic<T>(
        &mut self,
        tx: &mut Transaction,
        f: impl FnOnce(&mut Timeline, &mut Transaction) -> Result<T>,
    ) -> Result<T> {
        let mut local = Transaction::new();
        match f(self, &mut local) {
            Ok(value) => {
                tx.extend(local);
                Ok(value)
            }
            Err(error) => {
                self.rollback(local);
                Err(error)
            }
        }
    }

    fn rollback(&mut self, tx: Transaction) {
        let guides = MarkerOwner::Timeline(self.id);

        for command in tx.ordered(Direction::Backward) {
            let result = match command {
                Command::Timeline(id, op) if *id == self.id => self.apply(op, Direction::Backward),
                Command::Marker(owner, op) if *owner == guides => {
                    self.guides.write().apply(op, Direction::Backward)
                }
                _ => Err(Error::new_internal("foreign command in timeline transaction")),
            };

            if let Err(error) = result {
                tracing::error!(?error, "timeline rollback failed");
            }
        }
    }

    fn run(&mut self, tx: &mut Transaction, command: TimelineCommand) -> Result<()> {
        self.apply(&command, Direction::Forward)?;
        tx.push(Command::Timeline(self.id, command));
        Ok(())
    }

    fn push_undo(&self, name: impl Into<String>, tx: Transaction) {
        self.undo.push(name, tx);
    }
}
