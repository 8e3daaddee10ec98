use std::sync::{Arc, Weak};

use super::*;

fn f(frames: i64) -> FrameTime {
    FrameTime::from_frames(frames)
}

#[test]
fn point_stays_until_last_contributor_leaves() {
    let snaps = SnapRegistry::new();
    snaps.add_point(f(10));
    snaps.add_point(f(10));
    assert_eq!(snaps.count_at(f(10)), 2);

    snaps.remove_point(f(10));
    assert!(snaps.contains(f(10)));

    snaps.remove_point(f(10));
    assert!(!snaps.contains(f(10)));
    assert!(snaps.is_empty());
}

#[test]
fn removing_unknown_point_is_ignored() {
    let snaps = SnapRegistry::new();
    snaps.add_point(f(3));
    snaps.remove_point(f(4));
    assert_eq!(snaps.points(), vec![f(3)]);
}

#[test]
fn closest_respects_distance_and_ties() {
    let snaps = SnapRegistry::new();
    for frame in [0, 10, 20] {
        snaps.add_point(f(frame));
    }

    assert_eq!(snaps.closest(f(12), 5), Some(f(10)));
    assert_eq!(snaps.closest(f(15), 5), Some(f(10)));
    assert_eq!(snaps.closest(f(17), 5), Some(f(20)));
    assert_eq!(snaps.closest(f(40), 5), None);
    assert_eq!(snaps.closest(f(10), 0), Some(f(10)));
}

#[test]
fn neighbors_skip_ignored_points() {
    let snaps = SnapRegistry::new();
    for frame in [0, 10, 20, 30] {
        snaps.add_point(f(frame));
    }

    assert_eq!(snaps.next_after(f(10)), Some(f(20)));
    assert_eq!(snaps.previous_before(f(10)), Some(f(0)));

    snaps.ignore(&[f(10), f(20)]);
    assert_eq!(snaps.next_after(f(5)), Some(f(30)));
    assert_eq!(snaps.previous_before(f(25)), Some(f(0)));
    assert_eq!(snaps.closest(f(11), 5), None);

    snaps.unignore();
    assert_eq!(snaps.closest(f(11), 5), Some(f(10)));
}

#[test]
fn ignoring_withdraws_one_contribution() {
    let snaps = SnapRegistry::new();
    snaps.add_point(f(10));
    snaps.add_point(f(10));
    snaps.add_point(f(20));

    snaps.ignore(&[f(10), f(20)]);
    assert_eq!(snaps.closest(f(12), 5), Some(f(10)));
    assert_eq!(snaps.next_after(f(10)), None);

    snaps.ignore(&[f(10), f(10)]);
    assert_eq!(snaps.closest(f(12), 5), None);
    assert_eq!(snaps.next_after(f(5)), Some(f(20)));
}

#[test]
fn weak_observers_prune_dropped_entries() {
    let kept = Arc::new(SnapRegistry::new());
    let dropped = Arc::new(SnapRegistry::new());

    let mut observers = WeakObservers::<dyn SnapConsumer>::new();
    observers.register(Arc::downgrade(&kept) as Weak<dyn SnapConsumer>);
    observers.register(Arc::downgrade(&dropped) as Weak<dyn SnapConsumer>);
    drop(dropped);

    observers.notify(|consumer| consumer.add_point(f(7)));

    assert_eq!(observers.len(), 1);
    assert!(kept.contains(f(7)));
}
