use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use cutline_api::marker::{
    MarkerEvent, MarkerOwner, MarkerRole, MarkerType, MarkerTypeFilter,
};
use cutline_api::timeline::TimelineId;
use cutline_api::{Error, FrameTime, Result};
use futures::{FutureExt, StreamExt};
use parking_lot::RwLock;

use super::MarkerList;
use crate::snap::{SnapConsumer, SnapRegistry};
use crate::tests::init_tracing;
use crate::undo::UndoStack;

fn f(frames: i64) -> FrameTime {
    FrameTime::from_frames(frames)
}

fn kind(index: u8) -> Option<MarkerType> {
    MarkerType::new(index)
}

fn guides() -> (Arc<UndoStack>, Arc<RwLock<MarkerList>>) {
    init_tracing();
    let undo = Arc::new(UndoStack::new(0));
    let owner = MarkerOwner::Timeline(TimelineId::new_random());
    let list = MarkerList::new_shared(owner, MarkerType::default(), &undo);
    (undo, list)
}

fn comments(list: &MarkerList) -> Vec<(i64, String)> {
    list.all_markers(MarkerTypeFilter::Any)
        .into_iter()
        .map(|m| (m.time.frames(), m.comment))
        .collect()
}

#[test]
fn adding_at_an_occupied_frame_renames() -> Result<()> {
    let (undo, list) = guides();

    list.write().add_marker(f(100), "A", kind(0))?;
    assert!(list.read().has_marker(f(100)));

    list.write().add_marker(f(100), "B", kind(0))?;
    assert_eq!(list.read().len(), 1);
    assert_eq!(comments(&list.read()), vec![(100, "B".to_owned())]);
    assert_eq!(undo.entries(), vec!["Add guide", "Rename guide"]);

    undo.undo()?;
    assert_eq!(comments(&list.read()), vec![(100, "A".to_owned())]);

    undo.undo()?;
    assert!(list.read().is_empty());

    Ok(())
}

#[test]
fn default_type_is_used_when_none_given() -> Result<()> {
    init_tracing();
    let undo = Arc::new(UndoStack::new(0));
    let default = MarkerType::new(4).ok_or(Error::InvalidMarkerType { index: 4 })?;
    let owner = MarkerOwner::Timeline(TimelineId::new_random());
    let list = MarkerList::new_shared(owner, default, &undo);

    list.write().add_marker(f(5), "x", None)?;
    assert_eq!(list.read().marker_at(f(5)).map(|m| m.kind), Some(default));

    Ok(())
}

#[test]
fn removing_missing_marker_fails() -> Result<()> {
    let (undo, list) = guides();

    let result = list.write().remove_marker(f(3));
    assert!(matches!(result, Err(Error::NoMarker { frame: 3 })));
    assert!(result.is_err_and(|e| e.is_validation()));
    assert!(undo.is_empty());

    list.write().add_marker(f(3), "x", None)?;
    list.write().remove_marker(f(3))?;
    assert!(!list.read().has_marker(f(3)));

    undo.undo()?;
    assert!(list.read().has_marker(f(3)));

    Ok(())
}

#[test]
fn edit_keeps_identity_and_row() -> Result<()> {
    let (undo, list) = guides();

    list.write().add_marker(f(10), "first", kind(1))?;
    list.write().add_marker(f(50), "second", kind(2))?;
    let id = list.read().marker_at(f(10)).map(|m| m.id).ok_or(Error::InvalidId)?;

    list.write().edit_marker(f(10), f(70), "", None)?;

    let list_ref = list.read();
    let marker = list_ref.marker_at(f(70)).ok_or(Error::InvalidId)?;
    assert_eq!(marker.id, id);
    assert_eq!(marker.comment, "first");
    assert_eq!(marker.kind, MarkerType::new(1).ok_or(Error::InvalidId)?);
    assert_eq!(list_ref.row_of(id), Some(0));
    assert!(!list_ref.has_marker(f(10)));
    drop(list_ref);

    undo.undo()?;
    assert!(list.read().has_marker(f(10)));
    assert!(!list.read().has_marker(f(70)));

    Ok(())
}

#[test]
fn edit_onto_occupied_frame_changes_nothing() -> Result<()> {
    let (undo, list) = guides();

    list.write().add_marker(f(10), "a", None)?;
    list.write().add_marker(f(20), "b", None)?;
    let before = comments(&list.read());

    let result = list.write().edit_marker(f(10), f(20), "c", None);
    assert!(matches!(result, Err(Error::MarkerExists { frame: 20 })));
    assert_eq!(comments(&list.read()), before);
    assert_eq!(undo.len(), 2);

    Ok(())
}

#[test]
fn identical_edit_is_a_no_op() -> Result<()> {
    let (undo, list) = guides();

    list.write().add_marker(f(10), "a", kind(3))?;
    list.write().edit_marker(f(10), f(10), "a", kind(3))?;
    list.write().edit_marker(f(10), f(10), "", None)?;
    assert_eq!(undo.entries(), vec!["Add guide"]);

    Ok(())
}

#[test]
fn editing_missing_marker_is_an_invariant_violation() {
    let (_undo, list) = guides();

    let result = list.write().edit_marker(f(1), f(2), "x", None);
    assert!(matches!(result, Err(Error::InvalidId)));
    assert!(result.is_err_and(|e| e.is_invariant_violation()));
}

#[test]
fn move_markers_shifts_batch_atomically() -> Result<()> {
    let (undo, list) = guides();

    list.write().add_marker(f(10), "a", None)?;
    list.write().add_marker(f(20), "b", None)?;
    list.write().add_marker(f(40), "c", None)?;

    let batch = list.read().markers_in_range(f(10), Some(f(20)));
    list.write().move_markers(&batch, f(0), f(10))?;
    assert_eq!(
        comments(&list.read()),
        vec![(20, "a".into()), (30, "b".into()), (40, "c".into())]
    );

    let batch = list.read().markers_in_range(f(20), Some(f(30)));
    let result = list.write().move_markers(&batch, f(0), f(10));
    assert!(matches!(result, Err(Error::MarkerExists { frame: 40 })));
    assert_eq!(
        comments(&list.read()),
        vec![(20, "a".into()), (30, "b".into()), (40, "c".into())]
    );

    undo.undo()?;
    assert_eq!(
        comments(&list.read()),
        vec![(10, "a".into()), (20, "b".into()), (40, "c".into())]
    );

    Ok(())
}

#[test]
fn batch_add_is_one_entry() -> Result<()> {
    let (undo, list) = guides();

    let mut batch = BTreeMap::new();
    batch.insert(f(1), "one".to_owned());
    batch.insert(f(2), "two".to_owned());
    list.write().add_markers(&batch, None)?;
    assert_eq!(list.read().len(), 2);
    assert_eq!(undo.entries(), vec!["Add guide"]);

    Ok(())
}

#[test]
fn remove_all_restores_rows_on_undo() -> Result<()> {
    let (undo, list) = guides();

    list.write().add_marker(f(30), "a", None)?;
    list.write().add_marker(f(10), "b", None)?;
    let before = list.read().to_json()?;

    list.write().remove_all_markers()?;
    assert!(list.read().is_empty());
    assert_eq!(undo.undo_name().as_deref(), Some("Delete all guides"));

    undo.undo()?;
    assert_eq!(list.read().to_json()?, before);

    Ok(())
}

#[test]
fn query_filters_and_ranges() -> Result<()> {
    let (_undo, list) = guides();

    list.write().add_marker(f(30), "c", kind(1))?;
    list.write().add_marker(f(10), "a", kind(0))?;
    list.write().add_marker(f(20), "b", kind(1))?;

    let list = list.read();
    let kind = MarkerType::new(1).ok_or(Error::InvalidId)?;
    let only = list.all_markers(MarkerTypeFilter::Only(kind));
    assert_eq!(only.iter().map(|m| m.time.frames()).collect::<Vec<_>>(), vec![20, 30]);

    let range = list.markers_in_range(f(10), Some(f(20)));
    assert_eq!(range.len(), 2);
    assert!(list.markers_in_range(f(21), None).iter().all(|m| m.time == f(30)));
    assert!(list.markers_in_range(f(40), Some(f(0))).is_empty());
    assert_eq!(list.snap_points(), vec![f(10), f(20), f(30)]);

    Ok(())
}

#[test]
fn json_export_keeps_storage_order() -> Result<()> {
    let (_undo, list) = guides();

    list.write().add_marker(f(30), "late", kind(2))?;
    list.write().add_marker(f(10), "early", kind(0))?;

    let json = list.read().to_json()?;
    assert_eq!(
        json,
        r#"[{"pos":30,"comment":"late","type":2},{"pos":10,"comment":"early","type":0}]"#
    );

    let (_undo, copy) = guides();
    copy.write().import_from_json(&json, false, true)?;
    assert_eq!(copy.read().to_json()?, json);
    assert_eq!(comments(&copy.read()), comments(&list.read()));

    Ok(())
}

#[test]
fn conflicting_import_leaves_list_unchanged() -> Result<()> {
    let (undo, list) = guides();

    list.write().add_marker(f(10), "y", kind(0))?;

    let data = r#"[{"pos":5,"comment":"new","type":0},{"pos":10,"comment":"x","type":0}]"#;
    let result = list.write().import_from_json(data, false, true);
    assert!(matches!(result, Err(Error::MarkerConflict { frame: 10 })));
    assert_eq!(comments(&list.read()), vec![(10, "y".into())]);
    assert_eq!(undo.len(), 1);

    list.write().import_from_json(data, true, true)?;
    assert_eq!(comments(&list.read()), vec![(5, "new".into()), (10, "x".into())]);
    assert_eq!(undo.undo_name().as_deref(), Some("Import guides"));

    Ok(())
}

#[test]
fn identical_duplicates_import_cleanly() -> Result<()> {
    let (undo, list) = guides();

    list.write().add_marker(f(10), "x", kind(0))?;
    list.write().import_from_json(r#"[{"pos":10,"comment":"x","type":0}]"#, false, true)?;
    assert_eq!(list.read().len(), 1);
    assert_eq!(undo.len(), 1);

    Ok(())
}

#[test]
fn malformed_entries_are_skipped() -> Result<()> {
    let (_undo, list) = guides();

    let data = r#"[
        42,
        {"comment":"no position"},
        {"pos":"7"},
        {"pos":1},
        {"pos":2,"comment":"bad type","type":99}
    ]"#;
    list.write().import_from_json(data, false, false)?;

    let list = list.read();
    assert_eq!(list.len(), 2);
    let first = list.marker_at(f(1)).ok_or(Error::InvalidId)?;
    assert_eq!(first.comment, "Marker");
    let second = list.marker_at(f(2)).ok_or(Error::InvalidId)?;
    assert_eq!(second.kind, MarkerType::default());

    Ok(())
}

#[test]
fn integral_float_positions_are_accepted() -> Result<()> {
    let (_undo, list) = guides();

    let data = r#"[{"pos":10.0,"comment":"a","type":1.0},{"pos":12.5,"comment":"b"}]"#;
    list.write().import_from_json(data, false, true)?;

    assert_eq!(comments(&list.read()), vec![(10, "a".into())]);
    assert_eq!(list.read().marker_at(f(10)).map(|m| m.kind), kind(1));

    Ok(())
}

#[test]
fn non_array_import_fails() {
    let (_undo, list) = guides();

    for data in [r#"{"pos":1}"#, "not json"] {
        let result = list.write().import_from_json(data, false, true);
        assert!(matches!(result, Err(Error::InvalidJson { .. })));
    }

    assert!(list.read().is_empty());
}

#[test]
fn import_without_undo_does_not_push() -> Result<()> {
    let (undo, list) = guides();

    list.write().import_from_json(r#"[{"pos":1,"comment":"a","type":0}]"#, false, false)?;
    assert_eq!(list.read().len(), 1);
    assert!(undo.is_empty());

    Ok(())
}

#[test]
fn snap_consumers_are_seeded_and_pruned() -> Result<()> {
    let (undo, list) = guides();

    list.write().add_marker(f(10), "a", None)?;

    let snaps = Arc::new(SnapRegistry::new());
    let consumer: Weak<dyn SnapConsumer> = Arc::downgrade(&snaps) as Weak<SnapRegistry>;
    list.write().register_snap_consumer(consumer);
    assert_eq!(snaps.points(), vec![f(10)]);

    let transient = Arc::new(SnapRegistry::new());
    let consumer: Weak<dyn SnapConsumer> = Arc::downgrade(&transient) as Weak<SnapRegistry>;
    list.write().register_snap_consumer(consumer);
    drop(transient);

    list.write().add_marker(f(20), "b", None)?;
    assert_eq!(snaps.points(), vec![f(10), f(20)]);
    assert_eq!(list.read().snaps.len(), 1);

    undo.undo()?;
    assert_eq!(snaps.points(), vec![f(10)]);

    Ok(())
}

#[test]
fn subscribers_see_only_requested_roles() -> Result<()> {
    let (_undo, list) = guides();

    let mut comments_only = list.write().subscribe(vec![MarkerRole::Comment]);
    let mut colors_only = list.write().subscribe(vec![MarkerRole::Color]);

    list.write().add_marker(f(10), "a", kind(0))?;
    list.write().add_marker(f(10), "b", kind(0))?;

    let inserted = MarkerEvent::RowsInserted { first: 0, last: 0 };
    assert_eq!(comments_only.next().now_or_never(), Some(Some(inserted.clone())));
    assert_eq!(
        comments_only.next().now_or_never(),
        Some(Some(MarkerEvent::DataChanged {
            first: 0,
            last: 0,
            roles: vec![MarkerRole::Comment],
        }))
    );

    assert_eq!(colors_only.next().now_or_never(), Some(Some(inserted)));
    assert_eq!(colors_only.next().now_or_never(), None);

    Ok(())
}
