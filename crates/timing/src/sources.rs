/// External marker sources: video keyframes and the playback position
use std::cell::{Cell, RefCell};

use crate::{Feet, Marker, MarkerStyle, Ms, TimeRange};

/// Read-only provider of reference markers.
///
/// Used both for drawing and as extra snap targets. Implementations append
/// every marker inside `range` to `out` in ascending order.
pub trait MarkerSource {
    fn markers_in(&self, range: TimeRange, out: &mut Vec<Marker>);
}

/// Video keyframe times.
#[derive(Debug, Default)]
pub struct KeyframeMarkers {
    keyframes: RefCell<Vec<Ms>>,
    enabled: Cell<bool>,
}

impl KeyframeMarkers {
    pub fn new(mut keyframes: Vec<Ms>) -> Self {
        keyframes.sort_unstable();
        Self {
            keyframes: RefCell::new(keyframes),
            enabled: Cell::new(true),
        }
    }

    pub fn set_keyframes(&self, mut keyframes: Vec<Ms>) {
        keyframes.sort_unstable();
        *self.keyframes.borrow_mut() = keyframes;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

impl MarkerSource for KeyframeMarkers {
    fn markers_in(&self, range: TimeRange, out: &mut Vec<Marker>) {
        if !self.enabled.get() {
            return;
        }
        let keyframes = self.keyframes.borrow();
        let start = keyframes.partition_point(|&k| k < range.begin());
        out.extend(
            keyframes[start..]
                .iter()
                .take_while(|&&k| k < range.end())
                .map(|&k| Marker::new(k, MarkerStyle::Keyframe, Feet::NONE)),
        );
    }
}

/// Current video playback position, if a video is open.
#[derive(Debug, Default)]
pub struct PlayheadMarker {
    position: Cell<Option<Ms>>,
}

impl PlayheadMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&self, position: Option<Ms>) {
        self.position.set(position);
    }

    pub fn position(&self) -> Option<Ms> {
        self.position.get()
    }
}

impl MarkerSource for PlayheadMarker {
    fn markers_in(&self, range: TimeRange, out: &mut Vec<Marker>) {
        if let Some(pos) = self.position.get() {
            if range.contains(pos) {
                out.push(Marker::new(pos, MarkerStyle::Playhead, Feet::NONE));
            }
        }
    }
}
