mod json;
mod ops;
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use cutline_api::marker::{
    Marker, MarkerEvent, MarkerId, MarkerOwner, MarkerRole, MarkerType, MarkerTypeFilter,
};
use cutline_api::undo::Direction;
use cutline_api::{BoxStream, Error, FrameTime, Result};
use futures::StreamExt;
use parking_lot::RwLock;

use crate::snap::{SnapConsumer, WeakObservers};
use crate::subscribers::Subscribers;
use crate::undo::UndoStack;

/// Comment and colour of a marker, the part a rename changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerLabel {
    pub comment: String,
    pub kind: MarkerType,
}

impl From<&Marker> for MarkerLabel {
    fn from(marker: &Marker) -> MarkerLabel {
        MarkerLabel {
            comment: marker.comment.clone(),
            kind: marker.kind,
        }
    }
}

/// Reversible primitive on a marker list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerCommand {
    Add(Marker),
    Remove(Marker),
    Relabel {
        time: FrameTime,
        before: MarkerLabel,
        after: MarkerLabel,
    },
}

/// Markers of one timeline (guides) or one bin clip, at most one per frame.
///
/// Rows are reported in storage order, which is id order: a marker keeps
/// its row across undo and redo because it keeps its id.
pub struct MarkerList {
    owner: MarkerOwner,
    default_kind: MarkerType,
    markers: BTreeMap<MarkerId, Marker>,
    positions: BTreeMap<FrameTime, MarkerId>,
    snaps: WeakObservers<dyn SnapConsumer>,
    undo: Weak<UndoStack>,
    subscribers: Subscribers<(), MarkerEvent>,
}

impl MarkerList {
    pub fn new(owner: MarkerOwner, default_kind: MarkerType, undo: &Arc<UndoStack>) -> MarkerList {
        MarkerList {
            owner,
            default_kind,
            markers: BTreeMap::new(),
            positions: BTreeMap::new(),
            snaps: WeakObservers::new(),
            undo: Arc::downgrade(undo),
            subscribers: Subscribers::new(),
        }
    }

    /// Creates a shared list and registers it as an undo target.
    pub fn new_shared(
        owner: MarkerOwner,
        default_kind: MarkerType,
        undo: &Arc<UndoStack>,
    ) -> Arc<RwLock<MarkerList>> {
        let list = Arc::new(RwLock::new(MarkerList::new(owner, default_kind, undo)));
        undo.register_marker_list(owner, Arc::downgrade(&list));
        list
    }

    pub fn owner(&self) -> MarkerOwner {
        self.owner
    }

    pub fn default_kind(&self) -> MarkerType {
        self.default_kind
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn has_marker(&self, time: FrameTime) -> bool {
        self.positions.contains_key(&time)
    }

    pub fn marker_at(&self, time: FrameTime) -> Option<&Marker> {
        let id = self.positions.get(&time)?;
        self.markers.get(id)
    }

    pub fn marker_by_id(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    /// Row of a marker in storage order.
    pub fn row_of(&self, id: MarkerId) -> Option<usize> {
        self.markers
            .contains_key(&id)
            .then(|| self.markers.range(..id).count())
    }

    /// Markers in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Markers sorted by time.
    pub fn all_markers(&self, filter: MarkerTypeFilter) -> Vec<Marker> {
        self.positions
            .values()
            .filter_map(|id| self.markers.get(id))
            .filter(|m| filter.matches(m.kind))
            .cloned()
            .collect()
    }

    /// Markers with `start <= time <= end`, sorted by time. `end = None`
    /// means unbounded.
    pub fn markers_in_range(&self, start: FrameTime, end: Option<FrameTime>) -> Vec<Marker> {
        let end = end.unwrap_or(FrameTime::MAX);
        if end < start {
            return Vec::new();
        }

        self.positions
            .range(start..=end)
            .filter_map(|(_, id)| self.markers.get(id))
            .cloned()
            .collect()
    }

    pub fn snap_points(&self) -> Vec<FrameTime> {
        self.positions.keys().copied().collect()
    }

    /// Attaches a snap consumer and seeds it with every current marker.
    pub fn register_snap_consumer(&mut self, consumer: Weak<dyn SnapConsumer>) {
        if let Some(strong) = consumer.upgrade() {
            for &time in self.positions.keys() {
                strong.add_point(time);
            }
        }

        self.snaps.register(consumer);
    }

    /// Row notifications. `DataChanged` events are only delivered when
    /// they touch one of `roles`.
    pub fn subscribe(&mut self, roles: Vec<MarkerRole>) -> BoxStream<MarkerEvent> {
        self.subscribers
            .subscribe(())
            .filter(move |event| futures::future::ready(event.touches_any(&roles)))
            .boxed()
    }

    /// Applies a primitive in `direction`. Used by the undo stack and to
    /// roll back half-finished batches.
    pub fn apply(&mut self, command: &MarkerCommand, direction: Direction) -> Result<()> {
        let result = match (command, direction) {
            (MarkerCommand::Add(marker), Direction::Forward)
            | (MarkerCommand::Remove(marker), Direction::Backward) => self.insert(marker.clone()),
            (MarkerCommand::Remove(marker), Direction::Forward)
            | (MarkerCommand::Add(marker), Direction::Backward) => self.delete(marker),
            (
                MarkerCommand::Relabel {
                    time,
                    before,
                    after,
                },
                direction,
            ) => {
                let label = match direction {
                    Direction::Forward => after,
                    Direction::Backward => before,
                };
                self.relabel(*time, label)
            }
        };

        if let Err(error) = &result {
            tracing::error!(?error, ?command, ?direction, "marker command failed");
        }

        result
    }

    fn insert(&mut self, marker: Marker) -> Result<()> {
        if self.positions.contains_key(&marker.time) || self.markers.contains_key(&marker.id) {
            return Err(Error::new_internal(format!(
                "marker slot {} already taken",
                marker.time
            )));
        }

        let time = marker.time;
        let row = self.markers.range(..marker.id).count();
        self.positions.insert(time, marker.id);
        self.markers.insert(marker.id, marker);

        self.subscribers.notify(
            (),
            MarkerEvent::RowsInserted {
                first: row,
                last: row,
            },
        );
        self.snaps.notify(|snaps| snaps.add_point(time));

        Ok(())
    }

    fn delete(&mut self, marker: &Marker) -> Result<()> {
        if self.positions.get(&marker.time) != Some(&marker.id) {
            return Err(Error::InvalidId);
        }

        let row = self.markers.range(..marker.id).count();
        self.positions.remove(&marker.time);
        self.markers.remove(&marker.id);

        self.subscribers.notify(
            (),
            MarkerEvent::RowsRemoved {
                first: row,
                last: row,
            },
        );
        let time = marker.time;
        self.snaps.notify(|snaps| snaps.remove_point(time));

        Ok(())
    }

    fn relabel(&mut self, time: FrameTime, label: &MarkerLabel) -> Result<()> {
        let id = *self.positions.get(&time).ok_or(Error::InvalidId)?;
        let row = self.markers.range(..id).count();
        let marker = self.markers.get_mut(&id).ok_or(Error::InvalidId)?;

        let mut roles = Vec::new();
        if marker.comment != label.comment {
            roles.push(MarkerRole::Comment);
        }
        if marker.kind != label.kind {
            roles.push(MarkerRole::Color);
        }

        marker.comment.clone_from(&label.comment);
        marker.kind = label.kind;

        if !roles.is_empty() {
            self.subscribers.notify(
                (),
                MarkerEvent::DataChanged {
                    first: row,
                    last: row,
                    roles,
                },
            );
        }

        Ok(())
    }
}

impl std::fmt::Debug for MarkerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerList")
            .field("owner", &self.owner)
            .field("markers", &self.markers.len())
            .finish()
    }
}
