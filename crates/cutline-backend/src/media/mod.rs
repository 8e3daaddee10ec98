mod loader;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_channel::Receiver;
use cutline_api::marker::{MarkerOwner, MarkerType};
use cutline_api::media::{BinClipId, BinEvent, ClipStatus, Producer, ProducerResolver};
use cutline_api::{Error, ProjectConfig, Result};
use parking_lot::RwLock;
use tracing::instrument;

pub use self::loader::{LoadOutcome, Loader};
use crate::marker::MarkerList;
use crate::subscribers::Subscribers;
use crate::undo::UndoStack;

#[derive(Debug)]
pub struct BinClip {
    id: BinClipId,
    resource: String,
    status: ClipStatus,
    producer: Option<Arc<dyn Producer>>,
    markers: Arc<RwLock<MarkerList>>,
    /// Set once a load has succeeded. A failing first load deletes the
    /// clip; later failures only mark it missing.
    confirmed: bool,
}

impl BinClip {
    pub fn id(&self) -> BinClipId {
        self.id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn status(&self) -> ClipStatus {
        self.status
    }

    pub fn producer(&self) -> Option<&Arc<dyn Producer>> {
        self.producer.as_ref()
    }

    pub fn markers(&self) -> &Arc<RwLock<MarkerList>> {
        &self.markers
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }
}

/// Project media. Loads run in the background; their results are applied
/// only when the owner calls [`MediaBin::process_completions`].
#[derive(Debug)]
pub struct MediaBin {
    clips: BTreeMap<BinClipId, BinClip>,
    default_marker_type: MarkerType,
    undo: Arc<UndoStack>,
    loader: Loader,
    subscribers: Subscribers<(), BinEvent>,
}

impl MediaBin {
    pub fn new(
        config: &ProjectConfig,
        undo: Arc<UndoStack>,
        resolver: Arc<dyn ProducerResolver>,
    ) -> Result<MediaBin> {
        Ok(MediaBin {
            clips: BTreeMap::new(),
            default_marker_type: config.default_marker_type,
            undo,
            loader: Loader::new(resolver, config.load_workers)?,
            subscribers: Subscribers::new(),
        })
    }

    pub fn subscribe(&mut self) -> Receiver<BinEvent> {
        self.subscribers.subscribe(())
    }

    pub fn clip(&self, id: BinClipId) -> Option<&BinClip> {
        self.clips.get(&id)
    }

    pub fn clips(&self) -> impl Iterator<Item = &BinClip> + '_ {
        self.clips.values()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Registers a clip for `resource` and starts loading it.
    #[instrument(level = "trace", skip_all)]
    pub fn add_clip(&mut self, resource: impl Into<String>) -> BinClipId {
        let id = BinClipId::new();
        let resource = resource.into();
        let markers = MarkerList::new_shared(
            MarkerOwner::Clip(id),
            self.default_marker_type,
            &self.undo,
        );

        self.clips.insert(
            id,
            BinClip {
                id,
                resource: resource.clone(),
                status: ClipStatus::Loading,
                producer: None,
                markers,
                confirmed: false,
            },
        );

        self.loader.start(id, resource);
        self.subscribers.notify((), BinEvent::ClipAdded { id });
        id
    }

    /// Resolves the clip's resource again, e.g. after the file changed.
    #[instrument(level = "trace", skip_all, err)]
    pub fn reload_clip(&mut self, id: BinClipId) -> Result<()> {
        let clip = self.clips.get_mut(&id).ok_or(Error::InvalidId)?;
        clip.status = ClipStatus::Loading;
        let resource = clip.resource.clone();

        self.loader.start(id, resource);
        self.notify_status(id, ClipStatus::Loading);
        Ok(())
    }

    /// Requests cancellation of the clip's running load. Returns whether a
    /// load was running.
    #[instrument(level = "trace", skip_all, err)]
    pub fn cancel_load(&mut self, id: BinClipId) -> Result<bool> {
        if !self.clips.contains_key(&id) {
            return Err(Error::InvalidId);
        }

        Ok(self.loader.cancel(id))
    }

    pub fn is_loading(&self, id: BinClipId) -> bool {
        self.loader.is_loading(id)
    }

    /// Removes a clip from the bin. Its marker list is dropped with it, and
    /// so is the marker history.
    #[instrument(level = "trace", skip_all, err)]
    pub fn remove_clip(&mut self, id: BinClipId) -> Result<()> {
        self.clips.remove(&id).ok_or(Error::InvalidId)?;
        self.loader.abandon(id);
        self.undo.forget_marker_list(MarkerOwner::Clip(id));
        self.subscribers.notify((), BinEvent::ClipRemoved { id });
        Ok(())
    }

    /// Applies every load result that has arrived so far. Returns how many
    /// were applied.
    pub fn process_completions(&mut self) -> usize {
        let mut count = 0;
        while let Some(outcome) = self.loader.try_next() {
            if self.apply_outcome(outcome) {
                count += 1;
            }
        }
        count
    }

    /// Waits for the next load result and applies it. Returns the affected
    /// clip, or `None` when the result was stale.
    pub async fn process_next_completion(&mut self) -> Option<BinClipId> {
        let outcome = self.loader.next().await?;
        let clip = outcome.clip;
        self.apply_outcome(outcome).then_some(clip)
    }

    fn apply_outcome(&mut self, outcome: LoadOutcome) -> bool {
        if !self.loader.finish(&outcome) {
            tracing::debug!(clip = %outcome.clip, "dropping superseded load result");
            return false;
        }

        let id = outcome.clip;
        let Some(clip) = self.clips.get_mut(&id) else {
            tracing::debug!(%id, "load finished for a removed clip");
            return false;
        };

        let producer = match outcome.result {
            Ok(producer) if !outcome.canceled && producer.is_valid() => Some(producer),
            Ok(_) => None,
            Err(error) => {
                tracing::debug!(%id, %error, "load failed");
                None
            }
        };

        if let Some(producer) = producer {
            tracing::debug!(%id, "clip ready");
            clip.producer = Some(producer);
            clip.confirmed = true;
            clip.status = ClipStatus::Ready;
            self.notify_status(id, ClipStatus::Ready);
            return true;
        }

        if outcome.canceled || clip.confirmed {
            clip.producer = None;
            clip.status = ClipStatus::Missing;
            self.notify_status(id, ClipStatus::Missing);
        } else {
            clip.status = ClipStatus::Invalid;
            self.notify_status(id, ClipStatus::Invalid);
            self.clips.remove(&id);
            self.subscribers.notify((), BinEvent::ClipRemoved { id });
        }

        true
    }

    fn notify_status(&mut self, id: BinClipId, status: ClipStatus) {
        self.subscribers
            .notify((), BinEvent::StatusChanged { id, status });
    }
}
