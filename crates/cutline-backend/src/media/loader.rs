use std::sync::Arc;

use async_channel::{Receiver, Sender};
use cutline_api::media::{BinClipId, CancelToken, Producer, ProducerResolver};
use cutline_api::{Error, LoadError, Result};
use cutline_core::collections::HashMap;
use futures::executor::ThreadPool;

/// Result of one background load, delivered on the completion queue.
#[derive(Debug)]
pub struct LoadOutcome {
    pub clip: BinClipId,
    pub generation: u64,
    /// The load was canceled, whether or not the resolver noticed.
    pub canceled: bool,
    pub result: Result<Arc<dyn Producer>, LoadError>,
}

#[derive(Debug)]
struct PendingLoad {
    generation: u64,
    token: CancelToken,
}

/// Runs producer resolution on a thread pool. Outcomes come back over a
/// channel and are applied by whoever owns the model.
pub struct Loader {
    pool: ThreadPool,
    resolver: Arc<dyn ProducerResolver>,
    sender: Sender<LoadOutcome>,
    receiver: Receiver<LoadOutcome>,
    pending: HashMap<BinClipId, PendingLoad>,
    generation: u64,
}

impl Loader {
    pub fn new(resolver: Arc<dyn ProducerResolver>, workers: usize) -> Result<Loader> {
        let pool = ThreadPool::builder()
            .pool_size(workers.max(1))
            .name_prefix("cutline-loader-")
            .create()
            .map_err(Error::new_internal)?;

        let (sender, receiver) = async_channel::unbounded();

        Ok(Loader {
            pool,
            resolver,
            sender,
            receiver,
            pending: HashMap::default(),
            generation: 0,
        })
    }

    /// Starts resolving `resource` for `clip`, superseding any load still
    /// running for it.
    pub fn start(&mut self, clip: BinClipId, resource: String) -> u64 {
        if let Some(previous) = self.pending.remove(&clip) {
            previous.token.cancel();
        }

        self.generation += 1;
        let generation = self.generation;
        let token = CancelToken::new();
        self.pending.insert(
            clip,
            PendingLoad {
                generation,
                token: token.clone(),
            },
        );

        let resolver = self.resolver.clone();
        let sender = self.sender.clone();
        self.pool.spawn_ok(async move {
            let result = if token.is_canceled() {
                Err(LoadError::Canceled)
            } else {
                resolver.resolve(&resource, &token)
            };

            let outcome = LoadOutcome {
                clip,
                generation,
                canceled: token.is_canceled(),
                result,
            };

            if sender.send(outcome).await.is_err() {
                tracing::debug!(%clip, "load finished after the bin was dropped");
            }
        });

        generation
    }

    /// Flags the running load for `clip` as canceled. Its outcome still
    /// arrives on the queue.
    pub fn cancel(&self, clip: BinClipId) -> bool {
        match self.pending.get(&clip) {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels and forgets the load for `clip`; its outcome will be
    /// treated as stale.
    pub fn abandon(&mut self, clip: BinClipId) -> bool {
        match self.pending.remove(&clip) {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_loading(&self, clip: BinClipId) -> bool {
        self.pending.contains_key(&clip)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn try_next(&self) -> Option<LoadOutcome> {
        self.receiver.try_recv().ok()
    }

    pub async fn next(&self) -> Option<LoadOutcome> {
        self.receiver.recv().await.ok()
    }

    /// Marks `outcome` as handled. Returns `false` for outcomes of loads
    /// that were superseded by a later [`Loader::start`].
    pub fn finish(&mut self, outcome: &LoadOutcome) -> bool {
        match self.pending.get(&outcome.clip) {
            Some(pending) if pending.generation == outcome.generation => {
                self.pending.remove(&outcome.clip);
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("pending", &self.pending.len())
            .finish()
    }
}
