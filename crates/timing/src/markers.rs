/// Draggable boundary markers and the sorted marker index
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::{Ms, TimeRange};

/// Rendering role of a marker. Only the tag is carried here; colors and pen
/// widths belong to whoever draws it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStyle {
    /// Start boundary of the active line
    LineStart,
    /// End boundary of the active line
    LineEnd,
    /// Either boundary of a selected, non-active line
    Inactive,
    /// Video keyframe
    Keyframe,
    /// Current video playback position
    Playhead,
}

/// Which side(s) of a marker draw a foot decoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Feet {
    pub left: bool,
    pub right: bool,
}

impl Feet {
    pub const NONE: Feet = Feet {
        left: false,
        right: false,
    };
    pub const LEFT: Feet = Feet {
        left: true,
        right: false,
    };
    pub const RIGHT: Feet = Feet {
        left: false,
        right: true,
    };
}

/// A single boundary point.
///
/// The position is only writable by the owning [`crate::TimeableLine`], which
/// re-checks its left/right roles after every move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    position: Ms,
    pub style: MarkerStyle,
    pub feet: Feet,
}

impl Marker {
    pub fn new(position: Ms, style: MarkerStyle, feet: Feet) -> Self {
        Self {
            position,
            style,
            feet,
        }
    }

    pub fn position(&self) -> Ms {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Ms) {
        self.position = position;
    }

    pub(crate) fn swap_styles(&mut self, other: &mut Marker) {
        std::mem::swap(&mut self.style, &mut other.style);
        std::mem::swap(&mut self.feet, &mut other.feet);
    }
}

/// Physical marker slot inside a line. Never changes meaning when the
/// left/right roles swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerSlot {
    A,
    B,
}

impl MarkerSlot {
    pub fn index(self) -> usize {
        match self {
            MarkerSlot::A => 0,
            MarkerSlot::B => 1,
        }
    }

    pub fn other(self) -> MarkerSlot {
        match self {
            MarkerSlot::A => MarkerSlot::B,
            MarkerSlot::B => MarkerSlot::A,
        }
    }
}

/// Identifies a line owned by the timing controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKey {
    Active,
    Selected(usize),
}

/// Back-reference from the marker index to a marker and its owning line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerRef {
    pub line: LineKey,
    pub slot: MarkerSlot,
}

impl MarkerRef {
    pub fn new(line: LineKey, slot: MarkerSlot) -> Self {
        Self { line, slot }
    }
}

/// Marker references kept sorted by position.
///
/// The index does not own the markers, so every query takes a lookup from
/// reference to current position. Ties keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct MarkerIndex {
    refs: Vec<MarkerRef>,
}

impl MarkerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents and sort everything.
    pub fn rebuild<F>(&mut self, refs: impl IntoIterator<Item = MarkerRef>, position: F)
    where
        F: Fn(MarkerRef) -> Ms,
    {
        self.refs.clear();
        self.refs.extend(refs);
        self.sort_all(position);
    }

    pub fn sort_all<F>(&mut self, position: F)
    where
        F: Fn(MarkerRef) -> Ms,
    {
        self.refs.sort_by_key(|r| position(*r));
    }

    /// Re-sort a sub-range after markers inside it moved.
    pub fn sort_range<F>(&mut self, range: Range<usize>, position: F)
    where
        F: Fn(MarkerRef) -> Ms,
    {
        let end = range.end.min(self.refs.len());
        let start = range.start.min(end);
        self.refs[start..end].sort_by_key(|r| position(*r));
    }

    /// First index whose marker is at or after `ms`.
    pub fn lower_bound<F>(&self, ms: Ms, position: F) -> usize
    where
        F: Fn(MarkerRef) -> Ms,
    {
        self.refs.partition_point(|r| position(*r) < ms)
    }

    /// First index whose marker is strictly after `ms`.
    pub fn upper_bound<F>(&self, ms: Ms, position: F) -> usize
    where
        F: Fn(MarkerRef) -> Ms,
    {
        self.refs.partition_point(|r| position(*r) <= ms)
    }

    /// Markers from `range.begin()` up to and including `range.end()`.
    pub fn in_range<F>(&self, range: TimeRange, position: F) -> &[MarkerRef]
    where
        F: Fn(MarkerRef) -> Ms,
    {
        let start = self.lower_bound(range.begin(), &position);
        let end = self.upper_bound(range.end(), &position).max(start);
        &self.refs[start..end]
    }

    pub fn is_sorted<F>(&self, position: F) -> bool
    where
        F: Fn(MarkerRef) -> Ms,
    {
        self.refs
            .windows(2)
            .all(|pair| position(pair[0]) <= position(pair[1]))
    }

    pub fn as_slice(&self) -> &[MarkerRef] {
        &self.refs
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
