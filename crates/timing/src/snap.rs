//! Snapping a group of dragged markers onto nearby reference points.
//!
//! Everything here works on plain positions. The controller gathers the
//! candidates from its sorted marker index and applies the returned shift to
//! every dragged marker, so the group keeps its spacing.

use std::collections::HashSet;
use std::rc::Rc;

use crate::{Marker, MarkerSource, Ms, TimeRange};

/// Window that can contain a snap target for any of `active`.
pub fn snap_span(active: &[Ms], snap_range: Ms) -> Option<TimeRange> {
    let min = active.iter().copied().min()?;
    let max = active.iter().copied().max()?;
    Some(TimeRange::new(min - snap_range, max + snap_range))
}

/// Filter ascending `positions` down to the ones inside `span`, dropping
/// consecutive duplicates.
pub fn collect_candidates(positions: impl IntoIterator<Item = Ms>, span: TimeRange) -> Vec<Ms> {
    let mut out: Vec<Ms> = Vec::new();
    for pos in positions {
        if !span.contains(pos) {
            continue;
        }
        if out.last() == Some(&pos) {
            continue;
        }
        out.push(pos);
    }
    out
}

/// Keep `delta` if it is strictly closer than the best so far.
fn consider(best: &mut Option<Ms>, delta: Ms) {
    match best {
        Some(current) if delta.abs() >= current.abs() => {}
        _ => *best = Some(delta),
    }
}

/// Find the uniform shift that lands one of `active` on a snap target.
///
/// `candidates` must be ascending (see [`collect_candidates`]). For every
/// distinct active position the external sources are asked for markers in
/// a window of `snap_range` around it; those are checked before the
/// candidates, and the first closest target wins. Returns 0 when nothing is
/// within `snap_range`, when a marker already sits exactly on a target, or
/// when `snap_range` is 0.
pub fn find_shift(
    active: &[Ms],
    snap_range: Ms,
    candidates: &[Ms],
    sources: &[Rc<dyn MarkerSource>],
) -> Ms {
    assert!(snap_range >= 0, "snap range must not be negative");
    if snap_range == 0 || active.is_empty() {
        return 0;
    }

    let mut best: Option<Ms> = None;
    let mut evaluated = HashSet::with_capacity(active.len());
    let mut external: Vec<Marker> = Vec::new();

    for &pos in active {
        if !evaluated.insert(pos) {
            continue;
        }

        let window = TimeRange::around(pos, snap_range);
        external.clear();
        for source in sources {
            source.markers_in(window, &mut external);
        }
        for marker in &external {
            consider(&mut best, marker.position() - pos);
            if best == Some(0) {
                return 0;
            }
        }

        let start = candidates.partition_point(|&c| c < window.begin());
        for &candidate in &candidates[start..] {
            if candidate - pos > snap_range {
                break;
            }
            consider(&mut best, candidate - pos);
            if best == Some(0) {
                return 0;
            }
            // everything further right is further away
            if candidate > pos {
                break;
            }
        }
    }

    match best {
        Some(delta) if delta.abs() <= snap_range => delta,
        _ => 0,
    }
}
