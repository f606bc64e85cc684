//! Interactive timing of the active line and the lines selected with it.
//!
//! The controller owns one [`TimeableLine`] for the active item, one per
//! other selected item, and a [`MarkerIndex`] over all of their markers kept
//! sorted by position. Clicks and drags move markers, snapping them to
//! nearby references, and every touched line is remembered until the next
//! commit pushes the times back into the document.
//!
//! All entry points run to completion on the caller's thread. Notifications
//! from the document and the selection arrive over channels and are handled
//! by [`TimingController::pump`].

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, trace, warn};

use crate::{
    snap, CommitId, CommitType, ConnectionId, Document, FileChanged, Item, ItemId, LineKey,
    Marker, MarkerIndex, MarkerRef, MarkerSlot, MarkerSource, Ms, PlayheadMarker,
    SelectionController, SelectionEvent, Signal, TimeRange, TimeableLine, TimingSettings,
};

const COMMIT_REASON: &str = "timing";

/// The collaborators every controller operation works against.
pub struct TimingContext<'a> {
    pub document: &'a mut dyn Document,
    pub selection: &'a mut dyn SelectionController,
}

impl<'a> TimingContext<'a> {
    pub fn new(
        document: &'a mut dyn Document,
        selection: &'a mut dyn SelectionController,
    ) -> Self {
        Self {
            document,
            selection,
        }
    }
}

/// How [`TimingController::next`] advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextMode {
    /// Select the next line and nothing else
    TimingUnit,
    /// Advance and give the new line the default duration after the old end
    #[default]
    LineResetDefault,
    /// Advance, only timing the new line if it was never timed
    LineNoReset,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    /// One marker of the active line follows the pointer.
    SingleMarker(MarkerRef),
    /// Every marker of the active and selected lines shifts with the
    /// pointer; `anchor` is the time the previous shift was measured from.
    WholeSelection { markers: Vec<MarkerRef>, anchor: Ms },
}

#[derive(Debug, Clone, Copy)]
enum Move {
    To(Ms),
    By(Ms),
}

fn marker_ref<'a>(active: &'a TimeableLine, selected: &'a [TimeableLine], r: MarkerRef) -> &'a Marker {
    match r.line {
        LineKey::Active => active.marker(r.slot),
        LineKey::Selected(i) => selected[i].marker(r.slot),
    }
}

fn marker_position(active: &TimeableLine, selected: &[TimeableLine], r: MarkerRef) -> Ms {
    marker_ref(active, selected, r).position()
}

pub struct TimingController {
    settings: TimingSettings,
    active_line: TimeableLine,
    selected_lines: Vec<TimeableLine>,
    markers: MarkerIndex,
    modified_lines: BTreeSet<LineKey>,
    commit_id: Option<CommitId>,
    drag: DragState,
    sources: Vec<Rc<dyn MarkerSource>>,
    playhead: Option<Rc<PlayheadMarker>>,
    /// Set while our own commit is in flight so its notification is ignored.
    committing: bool,
    file_events: Receiver<FileChanged>,
    selection_events: Receiver<SelectionEvent>,
    marker_moved: Signal<()>,
    primary_range_updated: Signal<TimeRange>,
}

impl TimingController {
    pub fn new(ctx: &mut TimingContext<'_>, settings: TimingSettings) -> Self {
        let file_events = ctx.document.subscribe();
        let selection_events = ctx.selection.subscribe();
        let mut controller = Self {
            settings,
            active_line: TimeableLine::active(),
            selected_lines: Vec::new(),
            markers: MarkerIndex::new(),
            modified_lines: BTreeSet::new(),
            commit_id: None,
            drag: DragState::Idle,
            sources: Vec::new(),
            playhead: None,
            committing: false,
            file_events,
            selection_events,
            marker_moved: Signal::new(),
            primary_range_updated: Signal::new(),
        };
        controller.revert(ctx);
        controller
    }

    // Observers and sources

    pub fn on_marker_moved(&mut self, slot: impl FnMut(&()) + 'static) -> ConnectionId {
        self.marker_moved.connect(slot)
    }

    pub fn on_primary_range_updated(
        &mut self,
        slot: impl FnMut(&TimeRange) + 'static,
    ) -> ConnectionId {
        self.primary_range_updated.connect(slot)
    }

    pub fn disconnect_marker_moved(&mut self, id: ConnectionId) -> bool {
        self.marker_moved.disconnect(id)
    }

    pub fn disconnect_primary_range_updated(&mut self, id: ConnectionId) -> bool {
        self.primary_range_updated.disconnect(id)
    }

    pub fn add_marker_source(&mut self, source: Rc<dyn MarkerSource>) {
        self.sources.push(source);
        self.marker_moved.emit(&());
    }

    /// Register the video position marker; it also becomes a snap target.
    pub fn set_playhead(&mut self, playhead: Rc<PlayheadMarker>) {
        self.sources.push(playhead.clone());
        self.playhead = Some(playhead);
        self.marker_moved.emit(&());
    }

    /// Tell listeners that an external source moved its markers.
    pub fn notify_sources_changed(&mut self) {
        self.marker_moved.emit(&());
    }

    // Accessors

    pub fn settings(&self) -> &TimingSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TimingSettings {
        &mut self.settings
    }

    pub fn active_line(&self) -> &TimeableLine {
        &self.active_line
    }

    pub fn selected_lines(&self) -> &[TimeableLine] {
        &self.selected_lines
    }

    /// `None` for a key left over from before the selected lines were
    /// rebuilt.
    pub fn line(&self, key: LineKey) -> Option<&TimeableLine> {
        match key {
            LineKey::Active => Some(&self.active_line),
            LineKey::Selected(i) => self.selected_lines.get(i),
        }
    }

    fn held_line(&self, key: LineKey) -> &TimeableLine {
        match key {
            LineKey::Active => &self.active_line,
            LineKey::Selected(i) => &self.selected_lines[i],
        }
    }

    fn line_mut(&mut self, key: LineKey) -> &mut TimeableLine {
        match key {
            LineKey::Active => &mut self.active_line,
            LineKey::Selected(i) => &mut self.selected_lines[i],
        }
    }

    pub fn marker_index(&self) -> &MarkerIndex {
        &self.markers
    }

    pub fn is_index_sorted(&self) -> bool {
        let active = &self.active_line;
        let selected = &self.selected_lines;
        self.markers
            .is_sorted(|r| marker_position(active, selected, r))
    }

    pub fn marker(&self, r: MarkerRef) -> Option<&Marker> {
        self.line(r.line).map(|line| line.marker(r.slot))
    }

    pub fn position(&self, r: MarkerRef) -> Option<Ms> {
        self.marker(r).map(|m| m.position())
    }

    fn held_position(&self, r: MarkerRef) -> Ms {
        marker_position(&self.active_line, &self.selected_lines, r)
    }

    pub fn modified_lines(&self) -> &BTreeSet<LineKey> {
        &self.modified_lines
    }

    pub fn commit_id(&self) -> Option<CommitId> {
        self.commit_id
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn drag_anchor(&self) -> Option<Ms> {
        match self.drag {
            DragState::WholeSelection { anchor, .. } => Some(anchor),
            _ => None,
        }
    }

    pub fn ideal_visible_range(&self) -> TimeRange {
        self.active_line.range()
    }

    pub fn primary_playback_range(&self) -> TimeRange {
        self.active_line.range()
    }

    pub fn active_line_range(&self) -> TimeRange {
        self.active_line.range()
    }

    pub fn playhead_position(&self) -> Option<Ms> {
        self.playhead.as_ref().and_then(|p| p.position())
    }

    /// Markers to draw in `range`: line markers in position order, then the
    /// external sources so they paint on top.
    pub fn markers_in(&self, range: TimeRange) -> Vec<Marker> {
        let active = &self.active_line;
        let selected = &self.selected_lines;
        let mut out: Vec<Marker> = self
            .markers
            .in_range(range, |r| marker_position(active, selected, r))
            .iter()
            .map(|r| *marker_ref(active, selected, *r))
            .collect();
        for source in &self.sources {
            source.markers_in(range, &mut out);
        }
        out
    }

    // Incoming notifications

    /// Handle every queued document and selection notification.
    pub fn pump(&mut self, ctx: &mut TimingContext<'_>) {
        let selection: Vec<SelectionEvent> = self.selection_events.try_iter().collect();
        let files: Vec<FileChanged> = self.file_events.try_iter().collect();
        for event in selection {
            match event {
                SelectionEvent::ActiveChanged => self.on_active_item_changed(ctx),
                SelectionEvent::SelectionChanged => self.on_selection_changed(ctx),
            }
        }
        for event in files {
            self.on_file_changed(ctx, event.change);
        }
    }

    pub fn on_active_item_changed(&mut self, ctx: &mut TimingContext<'_>) {
        self.revert(ctx);
    }

    pub fn on_selection_changed(&mut self, ctx: &mut TimingContext<'_>) {
        self.regenerate_selected_lines(ctx);
    }

    pub fn on_file_changed(&mut self, ctx: &mut TimingContext<'_>, change: CommitType) {
        if self.committing {
            trace!("ignoring change notification for our own commit");
            return;
        }
        if change.contains(CommitType::TIMING) {
            self.revert(ctx);
        } else if change.contains(CommitType::ADD_REMOVE) {
            let stale = self
                .line_items()
                .into_iter()
                .any(|id| ctx.document.item(id).is_none());
            if stale {
                self.revert(ctx);
            } else {
                self.regenerate_inactive_lines();
            }
        }
    }

    // Clicks and drags

    /// Whether a click at `ms` would grab something.
    pub fn is_nearby_marker(&self, ms: Ms, sensitivity: Ms, alt_down: bool) -> bool {
        assert!(sensitivity >= 0, "sensitivity must not be negative");
        alt_down
            || self
                .active_line
                .contains_marker_in(TimeRange::new(ms - sensitivity, ms + sensitivity))
    }

    /// Start a drag. Returns the markers that will follow the pointer.
    ///
    /// With `alt_down` every marker of the active and selected lines is
    /// grabbed. Otherwise the nearer active-line marker within `sensitivity`
    /// is grabbed, and a grabbed left marker jumps to the click right away.
    /// A click near neither marker selects the item under the pointer.
    pub fn on_left_click(
        &mut self,
        ctx: &mut TimingContext<'_>,
        ms: Ms,
        alt_down: bool,
        sensitivity: Ms,
        snap_range: Ms,
    ) -> Vec<MarkerRef> {
        assert!(sensitivity >= 0, "sensitivity must not be negative");
        assert!(snap_range >= 0, "snap range must not be negative");

        self.drag = DragState::Idle;

        if alt_down {
            let mut grabbed: Vec<MarkerRef> = self
                .active_line
                .slots()
                .iter()
                .map(|slot| MarkerRef::new(LineKey::Active, *slot))
                .collect();
            for (i, line) in self.selected_lines.iter().enumerate() {
                grabbed.extend(
                    line.slots()
                        .iter()
                        .map(|slot| MarkerRef::new(LineKey::Selected(i), *slot)),
                );
            }
            debug!(ms, markers = grabbed.len(), "whole selection drag");
            self.drag = DragState::WholeSelection {
                markers: grabbed.clone(),
                anchor: ms,
            };
            return grabbed;
        }

        // an unbound line has nothing to time
        if self.active_line.item().is_none() {
            self.select_item_at(ctx, ms);
            return Vec::new();
        }

        let left = self.active_line.left_slot();
        let right = self.active_line.right_slot();
        let dist_l = (self.active_line.marker(left).position() - ms).abs();
        let dist_r = (self.active_line.marker(right).position() - ms).abs();

        if dist_l > sensitivity && dist_r > sensitivity {
            self.select_item_at(ctx, ms);
            return Vec::new();
        }

        let slot = if dist_l <= dist_r { left } else { right };
        let clicked = MarkerRef::new(LineKey::Active, slot);
        self.drag = DragState::SingleMarker(clicked);

        // only the left marker jumps to the click position
        if slot == left {
            self.set_markers(ctx, &[clicked], Move::To(ms), snap_range);
        }

        vec![clicked]
    }

    fn select_item_at(&mut self, ctx: &mut TimingContext<'_>, ms: Ms) {
        if let Some(id) = ctx.document.item_at(ms) {
            debug!(ms, item = %id, "click selects item");
            ctx.selection.set_selection_and_active(vec![id], Some(id));
            self.pump(ctx);
        }
    }

    /// Right clicks never start a drag in this mode.
    pub fn on_right_click(&mut self, _ms: Ms, sensitivity: Ms, snap_range: Ms) -> Vec<MarkerRef> {
        assert!(sensitivity >= 0, "sensitivity must not be negative");
        assert!(snap_range >= 0, "snap range must not be negative");
        Vec::new()
    }

    /// Pointer moved to `ms` while a drag is in progress.
    pub fn on_drag(&mut self, ctx: &mut TimingContext<'_>, ms: Ms, snap_range: Ms) {
        assert!(snap_range >= 0, "snap range must not be negative");
        match &mut self.drag {
            DragState::Idle => {}
            DragState::SingleMarker(r) => {
                let r = *r;
                self.set_markers(ctx, &[r], Move::To(ms), snap_range);
            }
            DragState::WholeSelection { markers, anchor } => {
                let shift = ms - *anchor;
                *anchor = ms;
                let grabbed = markers.clone();
                let snapped = self.set_markers(ctx, &grabbed, Move::By(shift), snap_range);
                if let DragState::WholeSelection { anchor, .. } = &mut self.drag {
                    *anchor += snapped;
                }
            }
        }
    }

    /// Button released or capture lost. Positions stay where they are.
    pub fn on_drag_end(&mut self) {
        if self.drag != DragState::Idle {
            trace!("drag ended");
        }
        self.drag = DragState::Idle;
    }

    // Keyboard timing

    pub fn next(&mut self, ctx: &mut TimingContext<'_>, mode: NextMode) {
        if mode == NextMode::TimingUnit {
            self.select_neighbor(ctx, true);
            return;
        }

        let new_end = self.active_line.right().position();
        let current = ctx.selection.active_item();
        let next = match current.and_then(|id| ctx.document.next_item(id)) {
            Some(id) => id,
            None => ctx.document.insert_item_after(current, Item::untimed()),
        };
        ctx.selection.set_selection_and_active(vec![next], Some(next));
        self.pump(ctx);

        let untimed = ctx.document.item(next).map_or(false, |item| item.end == 0);
        if mode == NextMode::LineResetDefault || untimed {
            self.active_line
                .set_times(new_end, new_end + self.settings.default_duration);
            self.sort_all_markers();
            self.modified_lines.insert(LineKey::Active);
            self.announce_primary_range();
            self.marker_moved.emit(&());
        }
    }

    pub fn prev(&mut self, ctx: &mut TimingContext<'_>) {
        self.select_neighbor(ctx, false);
    }

    fn select_neighbor(&mut self, ctx: &mut TimingContext<'_>, forward: bool) {
        let Some(current) = ctx.selection.active_item() else {
            return;
        };
        let neighbor = if forward {
            ctx.document.next_item(current)
        } else {
            ctx.document.prev_item(current)
        };
        if let Some(id) = neighbor {
            ctx.selection.set_selection_and_active(vec![id], Some(id));
            self.pump(ctx);
        }
    }

    pub fn add_lead_in(&mut self, ctx: &mut TimingContext<'_>) {
        let slot = self.active_line.left_slot();
        let target = self.active_line.marker(slot).position() - self.settings.lead_in;
        self.set_markers(ctx, &[MarkerRef::new(LineKey::Active, slot)], Move::To(target), 0);
    }

    pub fn add_lead_out(&mut self, ctx: &mut TimingContext<'_>) {
        let slot = self.active_line.right_slot();
        let target = self.active_line.marker(slot).position() + self.settings.lead_out;
        self.set_markers(ctx, &[MarkerRef::new(LineKey::Active, slot)], Move::To(target), 0);
    }

    /// Move the end by `delta` centiseconds, never before the start.
    pub fn modify_length(&mut self, ctx: &mut TimingContext<'_>, delta: i32) {
        let slot = self.active_line.right_slot();
        let target = (self.active_line.marker(slot).position() + Ms::from(delta) * 10)
            .max(self.active_line.left().position());
        self.set_markers(ctx, &[MarkerRef::new(LineKey::Active, slot)], Move::To(target), 0);
    }

    /// Move the start by `delta` centiseconds, never past the end.
    pub fn modify_start(&mut self, ctx: &mut TimingContext<'_>, delta: i32) {
        let slot = self.active_line.left_slot();
        let target = (self.active_line.marker(slot).position() + Ms::from(delta) * 10)
            .min(self.active_line.right().position());
        self.set_markers(ctx, &[MarkerRef::new(LineKey::Active, slot)], Move::To(target), 0);
    }

    // Moving markers

    /// Move `grabbed`, keep the index sorted, snap, and record the touched
    /// lines. Returns the snap shift applied on top of the move.
    fn set_markers(
        &mut self,
        ctx: &mut TimingContext<'_>,
        grabbed: &[MarkerRef],
        movement: Move,
        snap_range: Ms,
    ) -> Ms {
        if grabbed.is_empty() {
            return 0;
        }

        // The index only needs re-sorting where markers can have gone:
        // between the lowest and highest old or new position, widened by
        // the snap range.
        let (mut min_ms, mut max_ms) = match movement {
            Move::To(ms) => (ms, ms),
            Move::By(_) => (Ms::MAX, Ms::MIN),
        };
        for &r in grabbed {
            let pos = self.held_position(r);
            let target = match movement {
                Move::To(ms) => ms,
                Move::By(shift) => pos + shift,
            };
            min_ms = min_ms.min(pos).min(target);
            max_ms = max_ms.max(pos).max(target);
        }
        let (begin, end) = {
            let active = &self.active_line;
            let selected = &self.selected_lines;
            let pos = |r| marker_position(active, selected, r);
            let begin = self.markers.lower_bound(min_ms - snap_range, pos);
            let end = self.markers.upper_bound(max_ms + snap_range, pos);
            (begin, end.max(begin))
        };

        for &r in grabbed {
            let target = match movement {
                Move::To(ms) => ms,
                Move::By(shift) => self.held_position(r) + shift,
            };
            self.line_mut(r.line).set_position(r.slot, target);
            self.modified_lines.insert(r.line);
        }
        self.sort_markers(begin..end);

        let whole_selection = matches!(movement, Move::By(_));
        let snapped = self.snap_markers(grabbed, snap_range, whole_selection);
        if snapped != 0 {
            self.sort_markers(begin..end);
        }
        trace!(?movement, snapped, markers = grabbed.len(), "markers moved");

        if self.settings.auto_commit {
            self.do_commit(ctx, false);
        }
        self.announce_primary_range();
        self.marker_moved.emit(&());
        snapped
    }

    /// Shift `grabbed` onto the nearest snap target within `snap_range`.
    fn snap_markers(&mut self, grabbed: &[MarkerRef], snap_range: Ms, whole_selection: bool) -> Ms {
        if snap_range == 0 {
            return 0;
        }
        let positions: Vec<Ms> = grabbed.iter().map(|r| self.held_position(*r)).collect();
        let Some(span) = snap::snap_span(&positions, snap_range) else {
            return 0;
        };

        // every line is moving during a whole selection drag, so only the
        // external sources are left to snap to
        let candidates = if whole_selection {
            Vec::new()
        } else {
            let active = &self.active_line;
            let selected = &self.selected_lines;
            let pos = |r| marker_position(active, selected, r);
            let start = self.markers.lower_bound(span.begin(), pos);
            snap::collect_candidates(
                self.markers.as_slice()[start..]
                    .iter()
                    .filter(|r| !grabbed.contains(*r))
                    .map(|r| pos(*r))
                    .take_while(|p| *p < span.end()),
                span,
            )
        };

        let delta = snap::find_shift(&positions, snap_range, &candidates, &self.sources);
        if delta != 0 {
            for &r in grabbed {
                let target = self.held_position(r) + delta;
                self.line_mut(r.line).set_position(r.slot, target);
            }
        }
        delta
    }

    fn sort_markers(&mut self, range: std::ops::Range<usize>) {
        let active = &self.active_line;
        let selected = &self.selected_lines;
        self.markers
            .sort_range(range, |r| marker_position(active, selected, r));
    }

    fn sort_all_markers(&mut self) {
        let active = &self.active_line;
        let selected = &self.selected_lines;
        self.markers.sort_all(|r| marker_position(active, selected, r));
    }

    fn announce_primary_range(&mut self) {
        let range = self.active_line.range();
        self.primary_range_updated.emit(&range);
    }

    // Commit and revert

    /// Persist pending changes as a new history entry that later automatic
    /// commits will not merge into.
    pub fn commit(&mut self, ctx: &mut TimingContext<'_>) {
        self.do_commit(ctx, true);
    }

    fn do_commit(&mut self, ctx: &mut TimingContext<'_>, user_triggered: bool) {
        if self.modified_lines.is_empty() {
            return;
        }

        let mut applied = 0;
        for key in &self.modified_lines {
            let line = self.held_line(*key);
            let Some(id) = line.item() else {
                continue;
            };
            match ctx.document.item_mut(id) {
                Some(item) => {
                    line.apply_to_item(item);
                    applied += 1;
                }
                None => warn!(item = %id, "modified line refers to a missing item"),
            }
        }
        if applied == 0 {
            debug!("no modified line is bound to an item, nothing to commit");
            self.modified_lines.clear();
            return;
        }

        // anything already queued was not caused by this commit
        let pending: Vec<FileChanged> = self.file_events.try_iter().collect();

        self.committing = true;
        if user_triggered {
            ctx.document
                .commit(COMMIT_REASON, CommitType::TIMING, None, None);
            self.commit_id = None;
        } else {
            let amend = if self.modified_lines.len() == 1 {
                self.modified_lines
                    .iter()
                    .next()
                    .and_then(|key| self.held_line(*key).item())
            } else {
                None
            };
            let id = ctx
                .document
                .commit(COMMIT_REASON, CommitType::TIMING, self.commit_id, amend);
            self.commit_id = Some(id);
        }
        let own: Vec<FileChanged> = self.file_events.try_iter().collect();
        for event in own {
            self.on_file_changed(ctx, event.change);
        }
        self.committing = false;

        debug!(
            user_triggered,
            lines = self.modified_lines.len(),
            commit = ?self.commit_id,
            "committed timing"
        );
        self.modified_lines.clear();

        for event in pending {
            self.on_file_changed(ctx, event.change);
        }
    }

    /// Drop pending changes and rebind everything from the document.
    pub fn revert(&mut self, ctx: &mut TimingContext<'_>) {
        self.commit_id = None;
        self.drag = DragState::Idle;

        let active = ctx.selection.active_item();
        self.modified_lines.clear();
        match active.and_then(|id| ctx.document.item(id)) {
            Some(item) => {
                if self.active_line.bind(item) {
                    self.announce_primary_range();
                } else {
                    debug!(item = %item.id, "active item needs default timing");
                    self.modified_lines.insert(LineKey::Active);
                }
            }
            None => {
                if let Some(id) = active {
                    warn!(item = %id, "active item not found in document");
                }
                self.active_line = TimeableLine::active();
            }
        }

        if !self.regenerate_selected_lines(ctx) {
            self.regenerate_inactive_lines();
        }
    }

    /// Rebuild the selected lines. Returns whether the marker index was
    /// rebuilt.
    fn regenerate_selected_lines(&mut self, ctx: &mut TimingContext<'_>) -> bool {
        let was_empty = self.selected_lines.is_empty();
        self.selected_lines.clear();
        self.modified_lines.retain(|key| *key == LineKey::Active);
        if matches!(self.drag, DragState::WholeSelection { .. }) {
            self.drag = DragState::Idle;
        }

        let active = ctx.selection.active_item();
        for id in ctx.selection.selected_items() {
            if Some(id) == active {
                continue;
            }
            match ctx.document.item(id) {
                Some(item) => {
                    let mut line = TimeableLine::inactive();
                    line.bind(item);
                    self.selected_lines.push(line);
                }
                None => warn!(item = %id, "selected item not found in document"),
            }
        }

        if !self.selected_lines.is_empty() || !was_empty {
            debug!(lines = self.selected_lines.len(), "regenerated selected lines");
            self.regenerate_inactive_lines();
            true
        } else {
            false
        }
    }

    fn regenerate_inactive_lines(&mut self) {
        let mut refs: Vec<MarkerRef> = [MarkerSlot::A, MarkerSlot::B]
            .iter()
            .map(|slot| MarkerRef::new(LineKey::Active, *slot))
            .collect();
        for i in 0..self.selected_lines.len() {
            refs.push(MarkerRef::new(LineKey::Selected(i), MarkerSlot::A));
            refs.push(MarkerRef::new(LineKey::Selected(i), MarkerSlot::B));
        }
        let active = &self.active_line;
        let selected = &self.selected_lines;
        self.markers
            .rebuild(refs, |r| marker_position(active, selected, r));
        self.marker_moved.emit(&());
    }

    /// Item ids of every line currently held, active first.
    pub fn line_items(&self) -> Vec<ItemId> {
        std::iter::once(&self.active_line)
            .chain(self.selected_lines.iter())
            .filter_map(|line| line.item())
            .collect()
    }
}
