use std::sync::Arc;

use cutline_api::media::ProducerResolver;
use cutline_api::timeline::TimelineId;
use cutline_api::{Error, ProjectConfig, Result};
use cutline_core::collections::HashMap;
use parking_lot::RwLock;
use tracing::instrument;

use crate::media::MediaBin;
use crate::snap::SnapRegistry;
use crate::timeline::Timeline;
use crate::undo::UndoStack;

/// How a secondary timeline records its history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackMode {
    /// Interleave with the project's primary stack.
    Shared,
    /// Keep a stack of its own.
    Isolated,
}

/// An open document: the main timeline, any secondary timelines, and the
/// media bin, all sharing one id space.
#[derive(Debug)]
pub struct Project {
    config: ProjectConfig,
    undo: Arc<UndoStack>,
    main: TimelineId,
    timelines: HashMap<TimelineId, Arc<RwLock<Timeline>>>,
    bin: MediaBin,
}

impl Project {
    pub fn new(config: ProjectConfig, resolver: Arc<dyn ProducerResolver>) -> Result<Project> {
        let undo = Arc::new(UndoStack::new(config.undo_limit));
        let bin = MediaBin::new(&config, undo.clone(), resolver)?;

        let main = TimelineId::new_random();
        let timeline = Timeline::new_shared(main, &config, &undo, Arc::new(SnapRegistry::new()));
        let mut timelines = HashMap::default();
        timelines.insert(main, timeline);

        Ok(Project {
            config,
            undo,
            main,
            timelines,
            bin,
        })
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// The primary stack, shared by the main timeline and the bin.
    pub fn undo_stack(&self) -> &Arc<UndoStack> {
        &self.undo
    }

    pub fn main_timeline_id(&self) -> TimelineId {
        self.main
    }

    pub fn main_timeline(&self) -> Result<Arc<RwLock<Timeline>>> {
        self.timeline(self.main).ok_or(Error::InvalidId)
    }

    pub fn timeline(&self, id: TimelineId) -> Option<Arc<RwLock<Timeline>>> {
        self.timelines.get(&id).cloned()
    }

    pub fn timeline_ids(&self) -> Vec<TimelineId> {
        let mut ids: Vec<_> = self.timelines.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[instrument(level = "trace", skip_all)]
    pub fn create_timeline(&mut self, mode: StackMode) -> TimelineId {
        let undo = match mode {
            StackMode::Shared => self.undo.clone(),
            StackMode::Isolated => Arc::new(UndoStack::new(self.config.undo_limit)),
        };

        let id = TimelineId::new_random();
        let snaps = Arc::new(SnapRegistry::new());
        let timeline = Timeline::new_shared(id, &self.config, &undo, snaps);
        self.timelines.insert(id, timeline);

        tracing::debug!(?id, ?mode, "created timeline");
        id
    }

    /// Drops a secondary timeline along with its commands in the undo
    /// history. Entries of other timelines stay reachable.
    #[instrument(level = "trace", skip_all, err)]
    pub fn close_timeline(&mut self, id: TimelineId) -> Result<()> {
        if id == self.main {
            tracing::error!(?id, "the main timeline cannot be closed");
            return Err(Error::InvalidId);
        }

        let timeline = self.timelines.remove(&id).ok_or(Error::InvalidId)?;
        let undo = timeline.read().undo_stack().clone();
        drop(timeline);

        undo.forget_timeline(id);
        Ok(())
    }

    pub fn undo_stack_for(&self, id: TimelineId) -> Option<Arc<UndoStack>> {
        let timeline = self.timelines.get(&id)?;
        let undo = timeline.read().undo_stack().clone();
        Some(undo)
    }

    pub fn undo(&self) -> Result<()> {
        self.undo.undo()
    }

    pub fn redo(&self) -> Result<()> {
        self.undo.redo()
    }

    pub fn mark_clean(&self) {
        self.undo.mark_clean();
    }

    pub fn is_modified(&self) -> bool {
        !self.undo.is_clean()
    }

    pub fn bin(&self) -> &MediaBin {
        &self.bin
    }

    pub fn bin_mut(&mut self) -> &mut MediaBin {
        &mut self.bin
    }
}
