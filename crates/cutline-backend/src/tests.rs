use std::sync::Arc;
use std::time::{Duration, Instant};

use cutline_api::media::{CancelToken, MemoryProducer, Producer, ProducerResolver};
use cutline_api::timeline::{GroupId, GroupMember, ItemId, TrackFlags, TrackId, TrackKind};
use cutline_api::{FrameTime, LoadError, ProjectConfig, Result};
use cutline_core::collections::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing_subscriber::EnvFilter;

use crate::project::Project;
use crate::timeline::Timeline;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn f(frames: i64) -> FrameTime {
    FrameTime::from_frames(frames)
}

pub fn producer(frames: i64) -> Arc<dyn Producer> {
    MemoryProducer::with_duration(frames)
}

/// Resolver backed by a table of resource durations. Resources missing
/// from the table fail with `NotFound`; `"wait"` blocks until canceled.
#[derive(Debug, Default)]
pub struct TestResolver {
    durations: Mutex<HashMap<String, i64>>,
}

impl TestResolver {
    pub fn new() -> Arc<TestResolver> {
        Arc::new(TestResolver::default())
    }

    pub fn set(&self, resource: &str, frames: Option<i64>) {
        let mut durations = self.durations.lock();
        match frames {
            Some(frames) => durations.insert(resource.to_owned(), frames),
            None => durations.remove(resource),
        };
    }
}

impl ProducerResolver for TestResolver {
    fn resolve(
        &self,
        resource: &str,
        cancel: &CancelToken,
    ) -> Result<Arc<dyn Producer>, LoadError> {
        if resource == "wait" {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !cancel.is_canceled() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
            return Ok(producer(10));
        }

        let frames = self.durations.lock().get(resource).copied();
        match frames {
            Some(frames) => Ok(producer(frames)),
            None => Err(LoadError::NotFound {
                resource: resource.to_owned(),
            }),
        }
    }
}

pub fn project() -> Result<Project> {
    init_tracing();
    Project::new(ProjectConfig::default(), TestResolver::new())
}

/// A project whose main timeline has `tracks` video tracks.
pub fn project_with_tracks(
    tracks: usize,
) -> Result<(Project, Arc<RwLock<Timeline>>, Vec<TrackId>)> {
    let project = project()?;
    let timeline = project.main_timeline()?;

    let mut ids = Vec::new();
    for i in 0..tracks {
        let mut timeline = timeline.write();
        ids.push(timeline.request_track_insertion(i, TrackKind::Video, format!("V{}", i + 1))?);
    }

    project.undo_stack().mark_clean();
    Ok((project, timeline, ids))
}

/// Everything observable about a timeline, for before/after comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineState {
    pub tracks: Vec<(TrackId, String, TrackFlags)>,
    pub items: Vec<(ItemId, TrackId, FrameTime, FrameTime, FrameTime)>,
    pub ancestry: Vec<(ItemId, Vec<GroupId>)>,
    pub guides: String,
    pub snaps: Vec<(FrameTime, usize)>,
    pub duration: FrameTime,
}

pub fn capture(timeline: &Timeline) -> Result<TimelineState> {
    let tracks = timeline
        .track_ids()
        .iter()
        .filter_map(|&id| timeline.track(id))
        .map(|t| (t.id(), t.name.clone(), t.flags()))
        .collect();

    let mut items: Vec<_> = timeline
        .items()
        .map(|item| {
            (
                item.id(),
                item.track().unwrap_or(TrackId::MIN),
                item.position(),
                item.in_point(),
                item.out_point(),
            )
        })
        .collect();
    items.sort();

    let ancestry = items
        .iter()
        .map(|&(id, ..)| {
            let mut chain = Vec::new();
            let mut current = GroupMember::Item(id);
            while let Some(parent) = timeline.group_of(current) {
                chain.push(parent);
                current = GroupMember::Group(parent);
            }
            (id, chain)
        })
        .collect();

    let guides = timeline.guides().read().to_json()?;
    let snaps = timeline
        .snaps()
        .points()
        .into_iter()
        .map(|p| (p, timeline.snaps().count_at(p)))
        .collect();

    Ok(TimelineState {
        tracks,
        items,
        ancestry,
        guides,
        snaps,
        duration: timeline.duration(),
    })
}
