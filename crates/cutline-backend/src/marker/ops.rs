use std::collections::BTreeMap;

use cutline_api::marker::{Marker, MarkerId, MarkerType};
use cutline_api::undo::Direction;
use cutline_api::{Error, FrameTime, Result};
use tracing::instrument;

use super::{MarkerCommand, MarkerLabel, MarkerList};
use crate::undo::{Command, Transaction};

impl MarkerList {
    /// Adds a marker, or renames the one already at `time`. `kind = None`
    /// uses the list's default type.
    #[instrument(level = "trace", skip_all, err)]
    pub fn add_marker(
        &mut self,
        time: FrameTime,
        comment: impl Into<String>,
        kind: Option<MarkerType>,
    ) -> Result<()> {
        let verb = if self.has_marker(time) { "Rename" } else { "Add" };

        let mut tx = Transaction::new();
        self.add_marker_in(&mut tx, time, comment, kind)?;
        self.push_undo(self.label(verb), tx);

        Ok(())
    }

    pub fn add_marker_in(
        &mut self,
        tx: &mut Transaction,
        time: FrameTime,
        comment: impl Into<String>,
        kind: Option<MarkerType>,
    ) -> Result<()> {
        let label = MarkerLabel {
            comment: comment.into(),
            kind: kind.unwrap_or(self.default_kind),
        };

        let command = match self.marker_at(time) {
            Some(current) => {
                let before = MarkerLabel::from(current);
                if before == label {
                    return Ok(());
                }

                MarkerCommand::Relabel {
                    time,
                    before,
                    after: label,
                }
            }
            None => MarkerCommand::Add(Marker {
                id: MarkerId::new(),
                time,
                comment: label.comment,
                kind: label.kind,
            }),
        };

        self.run(tx, command)
    }

    /// Adds several markers in one undo entry. Existing markers at the
    /// same frames are renamed.
    #[instrument(level = "trace", skip_all, err)]
    pub fn add_markers(
        &mut self,
        markers: &BTreeMap<FrameTime, String>,
        kind: Option<MarkerType>,
    ) -> Result<()> {
        let renames = markers.keys().any(|&time| self.has_marker(time));

        let mut tx = Transaction::new();
        for (&time, comment) in markers {
            if let Err(error) = self.add_marker_in(&mut tx, time, comment.clone(), kind) {
                self.rollback(tx);
                return Err(error);
            }
        }

        let verb = if renames { "Rename" } else { "Add" };
        self.push_undo(self.label(verb), tx);
        Ok(())
    }

    #[instrument(level = "trace", skip_all, err)]
    pub fn remove_marker(&mut self, time: FrameTime) -> Result<()> {
        let mut tx = Transaction::new();
        self.remove_marker_in(&mut tx, time)?;
        self.push_undo(self.label("Delete"), tx);
        Ok(())
    }

    pub fn remove_marker_in(&mut self, tx: &mut Transaction, time: FrameTime) -> Result<()> {
        let marker = self.marker_at(time).cloned().ok_or(Error::NoMarker {
            frame: time.frames(),
        })?;
        self.run(tx, MarkerCommand::Remove(marker))
    }

    #[instrument(level = "trace", skip_all, err)]
    pub fn remove_all_markers(&mut self) -> Result<()> {
        let mut tx = Transaction::new();
        let markers: Vec<Marker> = self.markers.values().cloned().collect();
        for marker in markers {
            if let Err(error) = self.run(&mut tx, MarkerCommand::Remove(marker)) {
                self.rollback(tx);
                return Err(error);
            }
        }

        let name = if self.owner.is_guide() {
            "Delete all guides"
        } else {
            "Delete all markers"
        };
        self.push_undo(name, tx);
        Ok(())
    }

    /// Moves the marker at `old_time` to `new_time` and relabels it. An
    /// empty `comment` keeps the current comment and `kind = None` keeps the
    /// current type. The marker keeps its id.
    #[instrument(level = "trace", skip_all, err)]
    pub fn edit_marker(
        &mut self,
        old_time: FrameTime,
        new_time: FrameTime,
        comment: &str,
        kind: Option<MarkerType>,
    ) -> Result<()> {
        let mut tx = Transaction::new();
        self.edit_marker_in(&mut tx, old_time, new_time, comment, kind)?;
        self.push_undo(self.label("Edit"), tx);
        Ok(())
    }

    pub fn edit_marker_in(
        &mut self,
        tx: &mut Transaction,
        old_time: FrameTime,
        new_time: FrameTime,
        comment: &str,
        kind: Option<MarkerType>,
    ) -> Result<()> {
        let Some(current) = self.marker_at(old_time).cloned() else {
            tracing::error!(%old_time, "editing a marker that does not exist");
            return Err(Error::InvalidId);
        };

        let edited = Marker {
            id: current.id,
            time: new_time,
            comment: if comment.is_empty() {
                current.comment.clone()
            } else {
                comment.to_owned()
            },
            kind: kind.unwrap_or(current.kind),
        };

        if edited == current {
            return Ok(());
        }

        if old_time == new_time {
            let command = MarkerCommand::Relabel {
                time: old_time,
                before: MarkerLabel::from(&current),
                after: MarkerLabel::from(&edited),
            };
            return self.run(tx, command);
        }

        if self.has_marker(new_time) {
            return Err(Error::MarkerExists {
                frame: new_time.frames(),
            });
        }

        let mut local = Transaction::new();
        self.run(&mut local, MarkerCommand::Remove(current))?;
        if let Err(error) = self.run(&mut local, MarkerCommand::Add(edited)) {
            self.rollback(local);
            return Err(error);
        }

        tx.extend(local);
        Ok(())
    }

    /// Shifts `markers` by `to - from`. Every marker is removed before any
    /// is re-added, so markers may move onto each other's old frames; a
    /// target frame held by a marker outside the batch fails the batch.
    #[instrument(level = "trace", skip_all, err)]
    pub fn move_markers(
        &mut self,
        markers: &[Marker],
        from: FrameTime,
        to: FrameTime,
    ) -> Result<()> {
        let mut tx = Transaction::new();
        self.move_markers_in(&mut tx, markers, from, to)?;
        self.push_undo(self.label("Move"), tx);
        Ok(())
    }

    pub fn move_markers_in(
        &mut self,
        tx: &mut Transaction,
        markers: &[Marker],
        from: FrameTime,
        to: FrameTime,
    ) -> Result<()> {
        let delta = to - from;
        if markers.is_empty() || delta == FrameTime::ZERO {
            return Ok(());
        }

        let mut local = Transaction::new();
        let result = self.shift_markers(&mut local, markers, delta);
        match result {
            Ok(()) => {
                tx.extend(local);
                Ok(())
            }
            Err(error) => {
                self.rollback(local);
                Err(error)
            }
        }
    }

    fn shift_markers(
        &mut self,
        tx: &mut Transaction,
        markers: &[Marker],
        delta: FrameTime,
    ) -> Result<()> {
        let mut moved = Vec::with_capacity(markers.len());
        for marker in markers {
            let current = self.marker_at(marker.time).cloned().ok_or(Error::NoMarker {
                frame: marker.time.frames(),
            })?;
            self.run(tx, MarkerCommand::Remove(current.clone()))?;
            moved.push(current);
        }

        for marker in moved {
            let time = marker.time + delta;
            if self.has_marker(time) {
                return Err(Error::MarkerExists {
                    frame: time.frames(),
                });
            }

            self.run(tx, MarkerCommand::Add(Marker { time, ..marker }))?;
        }

        Ok(())
    }

    /// Reverts the commands of `tx` that target this list, newest first.
    pub(crate) fn rollback(&mut self, tx: Transaction) {
        for command in tx.ordered(Direction::Backward) {
            match command {
                Command::Marker(owner, op) if *owner == self.owner => {
                    if let Err(error) = self.apply(op, Direction::Backward) {
                        tracing::error!(?error, "marker rollback failed");
                    }
                }
                _ => tracing::error!(?command, "foreign command in marker transaction"),
            }
        }
    }

    pub(crate) fn run(&mut self, tx: &mut Transaction, command: MarkerCommand) -> Result<()> {
        self.apply(&command, Direction::Forward)?;
        tx.push(Command::Marker(self.owner, command));
        Ok(())
    }

    pub(crate) fn push_undo(&self, name: impl Into<String>, tx: Transaction) {
        match self.undo.upgrade() {
            Some(undo) => undo.push(name, tx),
            None => tracing::warn!("marker list outlived its undo stack"),
        }
    }

    fn label(&self, verb: &str) -> String {
        let noun = if self.owner.is_guide() { "guide" } else { "marker" };
        format!("{verb} {noun}")
    }
}
