mod command;

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use async_channel::Receiver;
use cutline_api::marker::MarkerOwner;
use cutline_api::timeline::TimelineId;
use cutline_api::undo::{Direction, UndoEvent};
use cutline_api::{Error, Result};
use cutline_core::collections::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::instrument;

pub use self::command::{Command, Transaction};
use crate::marker::MarkerList;
use crate::subscribers::Subscribers;
use crate::timeline::Timeline;

/// A named transaction as shown in history panels.
#[derive(Debug)]
pub struct UndoEntry {
    name: String,
    transaction: Transaction,
}

impl UndoEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }
}

#[derive(Debug, Default)]
struct History {
    entries: VecDeque<Arc<UndoEntry>>,
    /// Number of applied entries. Everything at and after it is redoable.
    index: usize,
    /// Index that matches the saved document. `None` once it is unreachable.
    clean: Option<usize>,
    limit: usize,
}

impl History {
    fn is_clean(&self) -> bool {
        self.clean == Some(self.index)
    }
}

#[derive(Default)]
struct Targets {
    timelines: HashMap<TimelineId, Weak<RwLock<Timeline>>>,
    marker_lists: HashMap<MarkerOwner, Weak<RwLock<MarkerList>>>,
}

/// Linear undo history shared by one or more timelines and marker lists.
///
/// Objects register themselves weakly. Closing an object prunes its
/// commands from the history; entries that still address a dropped object
/// fail with [`Error::ExpiredTarget`].
pub struct UndoStack {
    history: Mutex<History>,
    targets: Mutex<Targets>,
    subscribers: Mutex<Subscribers<(), UndoEvent>>,
}

impl UndoStack {
    pub fn new(limit: usize) -> UndoStack {
        UndoStack {
            history: Mutex::new(History {
                clean: Some(0),
                limit,
                ..History::default()
            }),
            targets: Mutex::new(Targets::default()),
            subscribers: Mutex::new(Subscribers::new()),
        }
    }

    pub fn register_timeline(&self, id: TimelineId, timeline: Weak<RwLock<Timeline>>) {
        self.targets.lock().timelines.insert(id, timeline);
    }

    pub fn register_marker_list(&self, owner: MarkerOwner, list: Weak<RwLock<MarkerList>>) {
        self.targets.lock().marker_lists.insert(owner, list);
    }

    /// Forgets the timeline `id` and its guides, dropping their commands
    /// from every entry.
    pub fn forget_timeline(&self, id: TimelineId) {
        {
            let mut targets = self.targets.lock();
            targets.timelines.remove(&id);
            targets.marker_lists.remove(&MarkerOwner::Timeline(id));
        }

        self.prune(|command| command.addresses_timeline(id));
    }

    /// Forgets the marker list of `owner`, dropping its commands from every
    /// entry.
    pub fn forget_marker_list(&self, owner: MarkerOwner) {
        self.targets.lock().marker_lists.remove(&owner);
        self.prune(|command| command.addresses_marker_list(owner));
    }

    /// Strips matching commands. Entries left empty are removed and the
    /// index and clean marker shift down past them.
    fn prune(&self, addressed: impl Fn(&Command) -> bool) {
        let (removed, was_clean, is_clean) = {
            let mut history = self.history.lock();
            let was_clean = history.is_clean();

            let entries = std::mem::take(&mut history.entries);
            let mut index = history.index;
            let mut clean = history.clean;
            let mut removed = 0;

            for (position, entry) in entries.into_iter().enumerate() {
                if !entry.transaction.commands().iter().any(&addressed) {
                    history.entries.push_back(entry);
                    continue;
                }

                let mut transaction = entry.transaction.clone();
                transaction.retain(|command| !addressed(command));

                if !transaction.is_empty() {
                    history.entries.push_back(Arc::new(UndoEntry {
                        name: entry.name.clone(),
                        transaction,
                    }));
                    continue;
                }

                removed += 1;
                if position < history.index {
                    index -= 1;
                }
                clean = clean.map(|clean| if position < clean { clean - 1 } else { clean });
            }

            history.index = index;
            history.clean = clean;
            (removed, was_clean, history.is_clean())
        };

        if removed == 0 {
            return;
        }

        tracing::debug!(removed, "pruned undo entries of a closed target");
        self.notify(UndoEvent::Pruned { removed }, was_clean, is_clean);
    }

    pub fn subscribe(&self) -> Receiver<UndoEvent> {
        self.subscribers.lock().subscribe(())
    }

    /// Records an already applied transaction. Empty transactions are
    /// dropped and the redoable tail is discarded.
    pub fn push(&self, name: impl Into<String>, transaction: Transaction) {
        if transaction.is_empty() {
            return;
        }

        let name = name.into();
        tracing::debug!(%name, commands = transaction.len(), "push undo entry");

        let (was_clean, is_clean) = {
            let mut history = self.history.lock();
            let was_clean = history.is_clean();

            let index = history.index;
            history.entries.truncate(index);
            if history.clean.is_some_and(|clean| clean > index) {
                history.clean = None;
            }

            history.entries.push_back(Arc::new(UndoEntry {
                name: name.clone(),
                transaction,
            }));
            history.index += 1;

            if history.limit > 0 && history.entries.len() > history.limit {
                history.entries.pop_front();
                history.index -= 1;
                history.clean = history.clean.and_then(|clean| clean.checked_sub(1));
            }

            (was_clean, history.is_clean())
        };

        self.notify(UndoEvent::Pushed { name }, was_clean, is_clean);
    }

    #[instrument(level = "trace", skip_all, err)]
    pub fn undo(&self) -> Result<()> {
        let entry = {
            let history = self.history.lock();
            let index = history.index.checked_sub(1).ok_or(Error::NothingToUndo)?;
            history.entries[index].clone()
        };

        tracing::debug!(name = %entry.name, "undo");
        self.apply_transaction(&entry.transaction, Direction::Backward)?;

        let (was_clean, is_clean) = {
            let mut history = self.history.lock();
            let was_clean = history.is_clean();
            history.index -= 1;
            (was_clean, history.is_clean())
        };

        let name = entry.name.clone();
        self.notify(UndoEvent::Undone { name }, was_clean, is_clean);
        Ok(())
    }

    #[instrument(level = "trace", skip_all, err)]
    pub fn redo(&self) -> Result<()> {
        let entry = {
            let history = self.history.lock();
            history
                .entries
                .get(history.index)
                .cloned()
                .ok_or(Error::NothingToRedo)?
        };

        tracing::debug!(name = %entry.name, "redo");
        self.apply_transaction(&entry.transaction, Direction::Forward)?;

        let (was_clean, is_clean) = {
            let mut history = self.history.lock();
            let was_clean = history.is_clean();
            history.index += 1;
            (was_clean, history.is_clean())
        };

        let name = entry.name.clone();
        self.notify(UndoEvent::Redone { name }, was_clean, is_clean);
        Ok(())
    }

    pub fn mark_clean(&self) {
        let was_clean = {
            let mut history = self.history.lock();
            let was_clean = history.is_clean();
            history.clean = Some(history.index);
            was_clean
        };

        if !was_clean {
            self.subscribers
                .lock()
                .notify((), UndoEvent::CleanChanged { clean: true });
        }
    }

    pub fn is_clean(&self) -> bool {
        self.history.lock().is_clean()
    }

    pub fn can_undo(&self) -> bool {
        self.history.lock().index > 0
    }

    pub fn can_redo(&self) -> bool {
        let history = self.history.lock();
        history.index < history.entries.len()
    }

    pub fn undo_name(&self) -> Option<String> {
        let history = self.history.lock();
        let index = history.index.checked_sub(1)?;
        Some(history.entries[index].name.clone())
    }

    pub fn redo_name(&self) -> Option<String> {
        let history = self.history.lock();
        history.entries.get(history.index).map(|e| e.name.clone())
    }

    /// Names of all entries, oldest first.
    pub fn entries(&self) -> Vec<String> {
        let history = self.history.lock();
        history.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn index(&self) -> usize {
        self.history.lock().index
    }

    pub fn len(&self) -> usize {
        self.history.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().entries.is_empty()
    }

    /// Applies every command of `transaction` for `direction`. When one
    /// fails, the commands already applied are reverted before returning.
    pub fn apply_transaction(&self, transaction: &Transaction, direction: Direction) -> Result<()> {
        let ordered = transaction.ordered(direction);

        for (i, command) in ordered.iter().enumerate() {
            let Err(error) = self.apply_command(command, direction) else {
                continue;
            };

            tracing::error!(?error, "undo entry failed to apply, reverting");
            for command in ordered[..i].iter().rev() {
                if let Err(error) = self.apply_command(command, direction.reversed()) {
                    tracing::error!(?error, "revert failed");
                }
            }

            return Err(error);
        }

        Ok(())
    }

    fn apply_command(&self, command: &Command, direction: Direction) -> Result<()> {
        match command {
            Command::Timeline(id, op) => {
                let timeline = self.timeline(*id)?;
                let mut timeline = timeline.write();
                timeline.apply(op, direction)
            }
            Command::Marker(owner, op) => {
                let list = self.marker_list(*owner)?;
                let mut list = list.write();
                list.apply(op, direction)
            }
        }
    }

    fn timeline(&self, id: TimelineId) -> Result<Arc<RwLock<Timeline>>> {
        let targets = self.targets.lock();
        let weak = targets.timelines.get(&id).ok_or(Error::ExpiredTarget)?;
        weak.upgrade().ok_or(Error::ExpiredTarget)
    }

    fn marker_list(&self, owner: MarkerOwner) -> Result<Arc<RwLock<MarkerList>>> {
        let targets = self.targets.lock();
        let weak = targets.marker_lists.get(&owner).ok_or(Error::ExpiredTarget)?;
        weak.upgrade().ok_or(Error::ExpiredTarget)
    }

    fn notify(&self, event: UndoEvent, was_clean: bool, is_clean: bool) {
        let mut subscribers = self.subscribers.lock();
        subscribers.notify((), event);
        if was_clean != is_clean {
            subscribers.notify((), UndoEvent::CleanChanged { clean: is_clean });
        }
    }
}

impl std::fmt::Debug for UndoStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let history = self.history.lock();
        f.debug_struct("UndoStack")
            .field("len", &history.entries.len())
            .field("index", &history.index)
            .field("clean", &history.clean)
            .finish()
    }
}
