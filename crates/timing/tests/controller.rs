/// Timing controller scenarios: drags, snapping, commits and notifications
use std::cell::RefCell;
use std::rc::Rc;

use crossbeam_channel::Receiver;
use timing::*;

fn timeline(items: Vec<Item>, selected: &[usize]) -> (Script, Selection) {
    let mut selection = Selection::new();
    if let Some(first) = items.first() {
        selection.select_single(first.id);
    }
    for &i in selected {
        selection.add_to_selection(items[i].id);
    }
    (Script::new(items), selection)
}

fn manual() -> TimingSettings {
    TimingSettings {
        auto_commit: false,
        ..TimingSettings::default()
    }
}

fn times(doc: &Script, i: usize) -> (Ms, Ms) {
    let item = &doc.items()[i];
    (item.start, item.end)
}

/// Wraps a [`Script`] and records the arguments of every commit.
struct RecordingDocument {
    script: Script,
    commits: Vec<(Option<CommitId>, Option<ItemId>, CommitId)>,
}

impl Document for RecordingDocument {
    fn item(&self, id: ItemId) -> Option<&Item> {
        self.script.item(id)
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.script.item_mut(id)
    }

    fn item_at(&self, ms: Ms) -> Option<ItemId> {
        self.script.item_at(ms)
    }

    fn next_item(&self, id: ItemId) -> Option<ItemId> {
        self.script.next_item(id)
    }

    fn prev_item(&self, id: ItemId) -> Option<ItemId> {
        self.script.prev_item(id)
    }

    fn insert_item_after(&mut self, after: Option<ItemId>, item: Item) -> ItemId {
        self.script.insert_item_after(after, item)
    }

    fn commit(
        &mut self,
        reason: &str,
        change: CommitType,
        coalesce: Option<CommitId>,
        amend: Option<ItemId>,
    ) -> CommitId {
        let id = self.script.commit(reason, change, coalesce, amend);
        self.commits.push((coalesce, amend, id));
        id
    }

    fn subscribe(&mut self) -> Receiver<FileChanged> {
        self.script.subscribe()
    }
}

#[test]
fn test_whole_selection_drag_keeps_spacing() {
    let (mut doc, mut sel) = timeline(
        vec![Item::new(100, 400, "a"), Item::new(500, 800, "b")],
        &[1],
    );
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, TimingSettings::default());
    assert_eq!(controller.selected_lines().len(), 1);

    let grabbed = controller.on_left_click(&mut ctx, 250, true, 10, 0);
    assert_eq!(grabbed.len(), 4);
    assert_eq!(controller.drag_anchor(), Some(250));

    controller.on_drag(&mut ctx, 300, 0);
    controller.on_drag_end();
    assert_eq!(controller.active_line_range(), TimeRange::new(150, 450));
    assert_eq!(controller.selected_lines()[0].range(), TimeRange::new(550, 850));
    assert_eq!(controller.drag_anchor(), None);

    drop(ctx);
    assert_eq!(times(&doc, 0), (150, 450));
    assert_eq!(times(&doc, 1), (550, 850));
    assert_eq!(doc.history().len(), 1);
}

#[test]
fn test_whole_selection_snaps_to_playhead_only() {
    let (mut doc, mut sel) = timeline(
        vec![Item::new(100, 400, "a"), Item::new(500, 800, "b")],
        &[1],
    );
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());
    let playhead = Rc::new(PlayheadMarker::new());
    playhead.set_position(Some(455));
    controller.set_playhead(playhead.clone());
    assert_eq!(controller.playhead_position(), Some(455));

    controller.on_left_click(&mut ctx, 250, true, 10, 10);
    controller.on_drag(&mut ctx, 300, 10);

    assert_eq!(controller.active_line_range(), TimeRange::new(155, 455));
    assert_eq!(controller.selected_lines()[0].range(), TimeRange::new(555, 855));
    assert_eq!(controller.drag_anchor(), Some(305));
}

#[test]
fn test_drag_snaps_to_selected_line_and_stays() {
    let (mut doc, mut sel) = timeline(
        vec![Item::new(500, 1000, "a"), Item::new(1200, 1800, "b")],
        &[1],
    );
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());

    let grabbed = controller.on_left_click(&mut ctx, 1000, false, 30, 20);
    assert_eq!(grabbed, vec![MarkerRef::new(LineKey::Active, MarkerSlot::B)]);

    controller.on_drag(&mut ctx, 1190, 20);
    assert_eq!(controller.active_line().right().position(), 1200);

    // already on the target, nothing changes
    controller.on_drag(&mut ctx, 1200, 20);
    assert_eq!(controller.active_line().right().position(), 1200);

    // out of range of everything
    controller.on_drag(&mut ctx, 1100, 20);
    assert_eq!(controller.active_line().right().position(), 1100);
    assert!(controller.is_index_sorted());
}

#[test]
fn test_external_source_wins_when_closer() {
    let (mut doc, mut sel) = timeline(
        vec![Item::new(500, 1000, "a"), Item::new(1200, 1800, "b")],
        &[1],
    );
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());
    let keyframes = Rc::new(KeyframeMarkers::new(vec![1185]));
    controller.add_marker_source(keyframes.clone());

    controller.on_left_click(&mut ctx, 1000, false, 30, 20);
    controller.on_drag(&mut ctx, 1190, 20);
    assert_eq!(controller.active_line().right().position(), 1185);

    keyframes.set_enabled(false);
    controller.on_drag(&mut ctx, 1190, 20);
    assert_eq!(controller.active_line().right().position(), 1200);
}

#[test]
fn test_dragging_end_past_start_swaps_roles() {
    let (mut doc, mut sel) = timeline(vec![Item::new(1000, 2000, "a")], &[]);
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, TimingSettings::default());

    controller.on_left_click(&mut ctx, 2000, false, 10, 0);
    controller.on_drag(&mut ctx, 900, 0);
    assert_eq!(controller.active_line_range(), TimeRange::new(900, 1000));
    assert_eq!(controller.active_line().left().style, MarkerStyle::LineStart);

    // the same physical marker keeps following the pointer
    controller.on_drag(&mut ctx, 950, 0);
    assert_eq!(controller.active_line_range(), TimeRange::new(950, 1000));
    controller.on_drag_end();

    drop(ctx);
    assert_eq!(times(&doc, 0), (950, 1000));
}

#[test]
fn test_index_stays_sorted_through_drags() {
    let (mut doc, mut sel) = timeline(
        vec![
            Item::new(1000, 2000, "a"),
            Item::new(1500, 2500, "b"),
            Item::new(3000, 3200, "c"),
        ],
        &[1, 2],
    );
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, TimingSettings::default());
    assert_eq!(controller.marker_index().len(), 6);

    controller.on_left_click(&mut ctx, 1000, false, 50, 50);
    for ms in [1200, 1480, 1600, 2100, 2550, 3100, 3300, 400, -20] {
        controller.on_drag(&mut ctx, ms, 50);
        assert!(controller.is_index_sorted(), "unsorted after drag to {}", ms);
    }
    controller.on_drag_end();

    controller.on_left_click(&mut ctx, 0, true, 50, 50);
    for ms in [700, -300, 2400, 2410] {
        controller.on_drag(&mut ctx, ms, 50);
        assert!(controller.is_index_sorted(), "unsorted after shift to {}", ms);
    }
}

#[test]
fn test_automatic_commits_coalesce_until_user_commit() {
    let items = vec![Item::new(1000, 2000, "a")];
    let id = items[0].id;
    let mut selection = Selection::new();
    selection.select_single(id);
    let mut doc = RecordingDocument {
        script: Script::new(items),
        commits: Vec::new(),
    };
    let mut ctx = TimingContext::new(&mut doc, &mut selection);
    let mut controller = TimingController::new(&mut ctx, TimingSettings::default());

    controller.on_left_click(&mut ctx, 1000, false, 10, 0);
    controller.on_drag(&mut ctx, 1010, 0);
    controller.on_drag(&mut ctx, 1020, 0);
    controller.on_drag_end();
    let group = controller.commit_id().expect("automatic commits open a group");

    controller.settings_mut().auto_commit = false;
    controller.add_lead_out(&mut ctx);
    controller.commit(&mut ctx);
    assert_eq!(controller.commit_id(), None);

    controller.settings_mut().auto_commit = true;
    controller.add_lead_in(&mut ctx);
    assert_ne!(controller.commit_id(), Some(group));

    drop(ctx);
    let coalesce: Vec<_> = doc.commits.iter().map(|c| c.0).collect();
    assert_eq!(coalesce, vec![None, Some(group), Some(group), None, None]);
    assert!(doc.commits[..3].iter().all(|c| c.2 == group));
    assert!(doc.commits.iter().all(|c| c.1 == Some(id) || c.0.is_none()));
    assert_eq!(doc.script.history().len(), 3);
    assert_eq!(doc.script.history()[0].merged, 3);
    assert_eq!(doc.script.item(id).map(|i| (i.start, i.end)), Some((820, 2300)));
}

#[test]
fn test_manual_commit_mode_holds_changes() {
    let (mut doc, mut sel) = timeline(vec![Item::new(1000, 2000, "a")], &[]);
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());

    controller.on_left_click(&mut ctx, 1000, false, 10, 0);
    controller.on_drag(&mut ctx, 1100, 0);
    controller.on_drag_end();
    assert!(controller.modified_lines().contains(&LineKey::Active));
    assert_eq!(ctx.document.item(controller.line_items()[0]).map(|i| i.start), Some(1000));

    controller.commit(&mut ctx);
    assert!(controller.modified_lines().is_empty());
    // a second commit has nothing to do
    controller.commit(&mut ctx);

    drop(ctx);
    assert_eq!(times(&doc, 0), (1100, 2000));
    assert_eq!(doc.history().len(), 1);
}

#[test]
fn test_external_changes_revert_the_lines() {
    let (mut doc, mut sel) = timeline(vec![Item::new(1000, 2000, "a")], &[]);
    let mut controller = {
        let mut ctx = TimingContext::new(&mut doc, &mut sel);
        let mut controller = TimingController::new(&mut ctx, TimingSettings::default());
        controller.add_lead_in(&mut ctx);
        assert_eq!(controller.active_line_range(), TimeRange::new(800, 2000));
        controller
    };

    doc.undo().unwrap();
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    controller.pump(&mut ctx);
    assert_eq!(controller.active_line_range(), TimeRange::new(1000, 2000));
    assert_eq!(controller.commit_id(), None);

    // edits from elsewhere
    let id = controller.line_items()[0];
    if let Some(item) = ctx.document.item_mut(id) {
        item.end = 2500;
    }
    ctx.document.commit("edit", CommitType::TIMING, None, None);
    controller.pump(&mut ctx);
    assert_eq!(controller.active_line_range(), TimeRange::new(1000, 2500));
}

#[test]
fn test_selection_changes_rebuild_index() {
    let items = vec![
        Item::new(1000, 2000, "a"),
        Item::new(3000, 4000, "b"),
        Item::new(5000, 6000, "c"),
    ];
    let ids: Vec<_> = items.iter().map(|i| i.id).collect();
    let (mut doc, mut sel) = timeline(items, &[]);
    let mut controller = {
        let mut ctx = TimingContext::new(&mut doc, &mut sel);
        TimingController::new(&mut ctx, manual())
    };
    assert_eq!(controller.marker_index().len(), 2);

    sel.add_to_selection(ids[1]);
    sel.add_to_selection(ids[2]);
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    controller.pump(&mut ctx);
    assert_eq!(controller.marker_index().len(), 6);
    let mut lines = controller.line_items();
    lines[1..].sort();
    let mut expected = ids.clone();
    expected[1..].sort();
    assert_eq!(lines, expected);
    assert!(controller.is_index_sorted());

    let visible = controller.markers_in(TimeRange::new(1500, 5000));
    let positions: Vec<_> = visible.iter().map(|m| m.position()).collect();
    assert_eq!(positions, vec![2000, 3000, 4000, 5000]);
    assert!(visible[1..].iter().all(|m| m.style == MarkerStyle::Inactive));
}

#[test]
fn test_markers_in_appends_sources_last() {
    let (mut doc, mut sel) = timeline(vec![Item::new(1000, 2000, "a")], &[]);
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());
    controller.add_marker_source(Rc::new(KeyframeMarkers::new(vec![500, 1500])));

    let styles: Vec<_> = controller
        .markers_in(TimeRange::new(0, 3000))
        .iter()
        .map(|m| (m.position(), m.style))
        .collect();
    assert_eq!(
        styles,
        vec![
            (1000, MarkerStyle::LineStart),
            (2000, MarkerStyle::LineEnd),
            (500, MarkerStyle::Keyframe),
            (1500, MarkerStyle::Keyframe),
        ]
    );
}

#[test]
fn test_next_gives_default_duration() {
    let (mut doc, mut sel) = timeline(
        vec![Item::new(1000, 2000, "a"), Item::new(5000, 6000, "b")],
        &[],
    );
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());

    controller.next(&mut ctx, NextMode::LineResetDefault);
    assert_eq!(controller.active_line_range(), TimeRange::new(2000, 4000));
    assert!(controller.modified_lines().contains(&LineKey::Active));
    controller.commit(&mut ctx);

    drop(ctx);
    assert_eq!(times(&doc, 1), (2000, 4000));
}

#[test]
fn test_next_without_reset() {
    let (mut doc, mut sel) = timeline(
        vec![Item::new(1000, 2000, "a"), Item::new(5000, 6000, "b")],
        &[],
    );
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());

    controller.next(&mut ctx, NextMode::LineNoReset);
    assert_eq!(controller.active_line_range(), TimeRange::new(5000, 6000));
    assert!(controller.modified_lines().is_empty());

    // past the last line a fresh untimed line is added and timed
    controller.next(&mut ctx, NextMode::LineNoReset);
    assert_eq!(controller.active_line_range(), TimeRange::new(6000, 8000));
    controller.commit(&mut ctx);

    drop(ctx);
    assert_eq!(doc.items().len(), 3);
    assert_eq!(times(&doc, 2), (6000, 8000));
}

#[test]
fn test_timing_unit_navigation() {
    let items = vec![Item::new(1000, 2000, "a"), Item::new(3000, 4000, "b")];
    let ids: Vec<_> = items.iter().map(|i| i.id).collect();
    let (mut doc, mut sel) = timeline(items, &[]);
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());

    controller.next(&mut ctx, NextMode::TimingUnit);
    assert_eq!(ctx.selection.active_item(), Some(ids[1]));
    assert_eq!(controller.active_line_range(), TimeRange::new(3000, 4000));

    // nothing after the last line in this mode
    controller.next(&mut ctx, NextMode::TimingUnit);
    assert_eq!(ctx.selection.active_item(), Some(ids[1]));

    controller.prev(&mut ctx);
    controller.prev(&mut ctx);
    assert_eq!(ctx.selection.active_item(), Some(ids[0]));
    assert_eq!(controller.active_line_range(), TimeRange::new(1000, 2000));
}

#[test]
fn test_observers_hear_moves_and_range_updates() {
    let (mut doc, mut sel) = timeline(vec![Item::new(1000, 2000, "a")], &[]);
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());

    let moved = Rc::new(RefCell::new(0));
    let ranges = Rc::new(RefCell::new(Vec::new()));
    let moved_id = {
        let moved = moved.clone();
        controller.on_marker_moved(move |_| *moved.borrow_mut() += 1)
    };
    {
        let ranges = ranges.clone();
        controller.on_primary_range_updated(move |r| ranges.borrow_mut().push(*r));
    }

    controller.modify_length(&mut ctx, 10);
    assert_eq!(*moved.borrow(), 1);
    assert_eq!(*ranges.borrow(), vec![TimeRange::new(1000, 2100)]);

    assert!(controller.disconnect_marker_moved(moved_id));
    controller.modify_start(&mut ctx, -10);
    assert_eq!(*moved.borrow(), 1);
    assert_eq!(ranges.borrow().last(), Some(&TimeRange::new(900, 2100)));
}

#[test]
fn test_multi_line_commit_has_no_amend_hint() {
    let items = vec![Item::new(100, 400, "a"), Item::new(500, 800, "b")];
    let mut selection = Selection::new();
    selection.select_single(items[0].id);
    selection.add_to_selection(items[1].id);
    let mut doc = RecordingDocument {
        script: Script::new(items),
        commits: Vec::new(),
    };
    let mut ctx = TimingContext::new(&mut doc, &mut selection);
    let mut controller = TimingController::new(&mut ctx, TimingSettings::default());

    controller.on_left_click(&mut ctx, 250, true, 10, 0);
    controller.on_drag(&mut ctx, 300, 0);
    controller.on_drag(&mut ctx, 320, 0);
    controller.on_drag_end();

    drop(ctx);
    assert_eq!(doc.commits.len(), 2);
    assert!(doc.commits.iter().all(|c| c.1.is_none()));
    assert_eq!(doc.commits[0].0, None);
    assert_eq!(doc.commits[1].0, Some(doc.commits[0].2));
    assert_eq!(doc.script.history().len(), 1);
    assert_eq!(doc.script.history()[0].amended, None);
}

#[test]
fn test_removed_active_item_unbinds_the_line() {
    let (mut doc, mut sel) = timeline(
        vec![Item::new(1000, 2000, "a"), Item::new(3000, 4000, "b")],
        &[],
    );
    let active = doc.items()[0].id;
    let mut controller = {
        let mut ctx = TimingContext::new(&mut doc, &mut sel);
        TimingController::new(&mut ctx, TimingSettings::default())
    };

    doc.remove_item(active).unwrap();
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    controller.pump(&mut ctx);
    assert_eq!(controller.active_line().item(), None);
    assert!(controller.modified_lines().is_empty());

    // nothing left to grab or commit
    assert!(controller.on_left_click(&mut ctx, 1000, false, 10, 0).is_empty());
    assert!(controller.on_left_click(&mut ctx, 0, false, 10, 0).is_empty());
    controller.on_drag(&mut ctx, 1100, 0);
    controller.on_drag(&mut ctx, 1200, 0);
    assert_eq!(controller.commit_id(), None);

    drop(ctx);
    assert_eq!(doc.history().len(), 1);
    assert_eq!(times(&doc, 0), (3000, 4000));
}

#[test]
fn test_commit_skips_lines_whose_item_is_gone() {
    let (mut doc, mut sel) = timeline(vec![Item::new(1000, 2000, "a")], &[]);
    let active = doc.items()[0].id;
    let mut controller = {
        let mut ctx = TimingContext::new(&mut doc, &mut sel);
        let mut controller = TimingController::new(&mut ctx, manual());
        controller.add_lead_in(&mut ctx);
        controller
    };
    assert!(controller.modified_lines().contains(&LineKey::Active));

    doc.remove_item(active).unwrap();
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    controller.commit(&mut ctx);
    assert!(controller.modified_lines().is_empty());

    drop(ctx);
    assert_eq!(doc.history().len(), 1);
    assert!(doc.items().is_empty());
}

#[test]
fn test_stale_marker_refs_resolve_to_none() {
    let (mut doc, mut sel) = timeline(
        vec![Item::new(100, 400, "a"), Item::new(500, 800, "b")],
        &[1],
    );
    let mut ctx = TimingContext::new(&mut doc, &mut sel);
    let mut controller = TimingController::new(&mut ctx, manual());

    let grabbed = controller.on_left_click(&mut ctx, 250, true, 10, 0);
    let selected = grabbed
        .iter()
        .copied()
        .find(|r| r.line == LineKey::Selected(0))
        .expect("selected line markers are grabbed");
    assert!(controller.position(selected).is_some());

    let active = controller.line_items()[0];
    ctx.selection.set_selection_and_active(vec![active], Some(active));
    controller.pump(&mut ctx);
    assert_eq!(controller.position(selected), None);
    assert!(controller.line(selected.line).is_none());
    assert_eq!(*controller.drag_state(), DragState::Idle);
}
