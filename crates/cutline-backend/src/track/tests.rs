use cutline_api::media::MemoryProducer;
use cutline_api::timeline::{ItemId, ItemKind, TrackId, TrackKind};
use cutline_api::{Error, FrameTime, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::Track;
use crate::item::{Extent, MoveableItem};

fn f(frames: i64) -> FrameTime {
    FrameTime::from_frames(frames)
}

fn clip(frames: i64) -> MoveableItem {
    MoveableItem::new(ItemId::new(), ItemKind::Clip, MemoryProducer::with_duration(frames))
}

fn composition(frames: i64) -> MoveableItem {
    MoveableItem::new(
        ItemId::new(),
        ItemKind::Composition,
        MemoryProducer::with_duration(frames),
    )
}

fn track() -> Track {
    Track::new(TrackId::new(), TrackKind::Video, "V1".into())
}

fn positions(track: &Track) -> Vec<(i64, i64)> {
    track
        .clips()
        .iter()
        .map(|item| (item.position().frames(), item.end().frames()))
        .collect()
}

#[test]
fn adjacent_items_fit_overlapping_do_not() -> Result<()> {
    let mut track = track();

    track.insert(clip(50), f(0))?;
    track.insert(clip(50), f(50))?;
    assert!(matches!(track.insert(clip(20), f(40)), Err(Error::Collision)));
    assert_eq!(track.len(), 2);
    assert_eq!(positions(&track), vec![(0, 50), (50, 100)]);

    Ok(())
}

#[test]
fn compositions_use_their_own_lane() -> Result<()> {
    let mut track = track();

    track.insert(clip(50), f(0))?;
    track.insert(composition(30), f(10))?;
    assert!(matches!(
        track.insert(composition(10), f(20)),
        Err(Error::Collision)
    ));
    assert_eq!(track.end(), f(50));

    Ok(())
}

#[test]
fn empty_items_are_rejected() {
    let mut track = track();
    assert!(matches!(track.insert(clip(0), f(0)), Err(Error::EmptyRange)));
    assert!(track.is_empty());
}

#[test]
fn failed_move_leaves_track_untouched() -> Result<()> {
    let mut track = track();

    let a = clip(10);
    let a_id = a.id();
    track.insert(a, f(0))?;
    track.insert(clip(10), f(20))?;

    assert!(matches!(track.move_item(a_id, f(15)), Err(Error::Collision)));
    assert_eq!(positions(&track), vec![(0, 10), (20, 30)]);

    track.move_item(a_id, f(5))?;
    track.move_item(a_id, f(10))?;
    assert_eq!(positions(&track), vec![(10, 20), (20, 30)]);

    assert!(matches!(track.move_item(ItemId::new(), f(0)), Err(Error::InvalidId)));

    Ok(())
}

#[test]
fn remove_requires_presence() -> Result<()> {
    let mut track = track();

    let item = clip(10);
    let id = item.id();
    track.insert(item, f(0))?;

    let removed = track.remove(id)?;
    assert_eq!(removed.track(), None);
    assert!(matches!(track.remove(id), Err(Error::InvalidId)));

    Ok(())
}

#[test]
fn extent_changes_are_checked() -> Result<()> {
    let mut track = track();

    let item = clip(10);
    let id = item.id();
    track.insert(item, f(0))?;
    track.insert(clip(10), f(20))?;

    let grown = Extent {
        position: f(0),
        in_point: f(0),
        out_point: f(25),
    };
    assert!(matches!(track.set_extent(id, grown), Err(Error::Collision)));

    let empty = Extent {
        position: f(0),
        in_point: f(5),
        out_point: f(5),
    };
    assert!(matches!(track.set_extent(id, empty), Err(Error::EmptyRange)));

    let trimmed = Extent {
        position: f(4),
        in_point: f(4),
        out_point: f(20),
    };
    track.set_extent(id, trimmed)?;
    assert_eq!(positions(&track), vec![(4, 20), (20, 30)]);

    Ok(())
}

#[test]
fn blank_queries() -> Result<()> {
    let mut track = track();

    track.insert(clip(10), f(0))?;
    track.insert(clip(10), f(10))?;
    track.insert(clip(10), f(30))?;

    assert_eq!(track.item_at(f(9)).map(|i| i.position()), Some(f(0)));
    assert_eq!(track.item_at(f(10)).map(|i| i.position()), Some(f(10)));
    assert!(track.item_at(f(25)).is_none());

    assert_eq!(track.next_blank(f(0)), f(20));
    assert_eq!(track.next_blank(f(25)), f(25));
    assert_eq!(track.next_blank(f(30)), f(40));

    assert_eq!(track.previous_blank(f(35)), Some(f(29)));
    assert_eq!(track.previous_blank(f(15)), None);

    assert_eq!(track.clips().blank_length_at(f(20)), Some(f(10)));
    assert_eq!(track.clips().blank_length_at(f(5)), None);
    assert_eq!(track.clips().blank_length_at(f(40)), Some(FrameTime::MAX));

    let hits: Vec<_> = track
        .clips()
        .range(f(5), f(31))
        .map(|i| i.position().frames())
        .collect();
    assert_eq!(hits, vec![0, 10, 30]);

    Ok(())
}

#[test]
fn random_edits_never_overlap() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut track = track();
    let mut ids = Vec::new();

    for _ in 0..2000 {
        match rng.gen_range(0..3) {
            0 => {
                let item = clip(rng.gen_range(1..30));
                let id = item.id();
                if track.insert(item, f(rng.gen_range(0..500))).is_ok() {
                    ids.push(id);
                }
            }
            1 if !ids.is_empty() => {
                let id = ids[rng.gen_range(0..ids.len())];
                let _ = track.move_item(id, f(rng.gen_range(0..500)));
            }
            2 if !ids.is_empty() => {
                let id = ids.swap_remove(rng.gen_range(0..ids.len()));
                track.remove(id)?;
            }
            _ => {}
        }

        let spans = positions(&track);
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlap in {spans:?}");
        }
        assert_eq!(spans.len(), ids.len());
    }

    Ok(())
}
