/// A pair of markers bound to one timed item
use serde::{Deserialize, Serialize};

use crate::{Feet, Item, ItemId, Marker, MarkerSlot, MarkerStyle, Ms, TimeRange};

/// Two markers plus the item they time.
///
/// `left` names the slot currently playing the start role; the other slot is
/// the end. When a move puts the end before the start the roles swap and so
/// do the styles, so a marker's style always says "start" or "end" rather
/// than following the physical marker around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeableLine {
    item: Option<ItemId>,
    markers: [Marker; 2],
    left: MarkerSlot,
}

impl TimeableLine {
    pub fn new(style_left: MarkerStyle, style_right: MarkerStyle) -> Self {
        Self {
            item: None,
            markers: [
                Marker::new(0, style_left, Feet::RIGHT),
                Marker::new(0, style_right, Feet::LEFT),
            ],
            left: MarkerSlot::A,
        }
    }

    /// The line used for the active item.
    pub fn active() -> Self {
        Self::new(MarkerStyle::LineStart, MarkerStyle::LineEnd)
    }

    /// The line used for selected, non-active items.
    pub fn inactive() -> Self {
        Self::new(MarkerStyle::Inactive, MarkerStyle::Inactive)
    }

    pub fn item(&self) -> Option<ItemId> {
        self.item
    }

    /// Track `item` and reset the markers to its times.
    ///
    /// A line that was already bound leaves its markers alone when the new
    /// item has never been timed (`end == 0`); the `false` return tells the
    /// caller the line still needs explicit timing.
    pub fn bind(&mut self, item: &Item) -> bool {
        let reset = self.item.is_none() || item.end > 0;
        self.item = Some(item.id);
        if reset {
            self.set_position(MarkerSlot::A, item.start);
            self.set_position(MarkerSlot::B, item.end);
        }
        reset
    }

    pub fn left_slot(&self) -> MarkerSlot {
        self.left
    }

    pub fn right_slot(&self) -> MarkerSlot {
        self.left.other()
    }

    pub fn marker(&self, slot: MarkerSlot) -> &Marker {
        &self.markers[slot.index()]
    }

    pub fn left(&self) -> &Marker {
        self.marker(self.left_slot())
    }

    pub fn right(&self) -> &Marker {
        self.marker(self.right_slot())
    }

    /// Both markers in left, right order.
    pub fn markers(&self) -> (&Marker, &Marker) {
        (self.left(), self.right())
    }

    /// Both slots in left, right order.
    pub fn slots(&self) -> [MarkerSlot; 2] {
        [self.left_slot(), self.right_slot()]
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.left().position(), self.right().position())
    }

    pub fn contains_marker_in(&self, range: TimeRange) -> bool {
        self.markers.iter().any(|m| range.contains(m.position()))
    }

    /// Move one marker. Roles are re-checked before returning.
    pub fn set_position(&mut self, slot: MarkerSlot, position: Ms) {
        self.markers[slot.index()].set_position(position);
        self.check_and_fix_roles();
    }

    /// Move both markers at once, keeping the current roles when
    /// `start <= end`.
    pub fn set_times(&mut self, start: Ms, end: Ms) {
        let (left, right) = (self.left_slot(), self.right_slot());
        self.markers[left.index()].set_position(start);
        self.markers[right.index()].set_position(end);
        self.check_and_fix_roles();
    }

    pub fn check_and_fix_roles(&mut self) {
        if self.right().position() < self.left().position() {
            let [a, b] = &mut self.markers;
            a.swap_styles(b);
            self.left = self.left.other();
        }
    }

    /// Write the marker times back into the item.
    pub fn apply_to_item(&self, item: &mut Item) {
        if self.item == Some(item.id) {
            item.start = self.left().position();
            item.end = self.right().position();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(start: Ms, end: Ms) -> Item {
        Item::new(start, end, "line")
    }

    fn style_set(line: &TimeableLine) -> Vec<(MarkerStyle, Feet)> {
        let mut set: Vec<_> = [MarkerSlot::A, MarkerSlot::B]
            .iter()
            .map(|s| (line.marker(*s).style, line.marker(*s).feet))
            .collect();
        set.sort_by_key(|(style, feet)| (*style as u8, feet.left, feet.right));
        set
    }

    #[test]
    fn test_bind_sets_times() {
        let mut line = TimeableLine::active();
        let item = timed(1000, 2000);
        assert!(line.bind(&item));
        assert_eq!(line.item(), Some(item.id));
        assert_eq!(line.range(), TimeRange::new(1000, 2000));
        assert_eq!(line.left().style, MarkerStyle::LineStart);
        assert_eq!(line.right().style, MarkerStyle::LineEnd);
    }

    #[test]
    fn test_bind_untimed_item_keeps_markers() {
        let mut line = TimeableLine::active();
        assert!(line.bind(&timed(1000, 2000)));

        let fresh = timed(0, 0);
        assert!(!line.bind(&fresh));
        assert_eq!(line.item(), Some(fresh.id));
        assert_eq!(line.range(), TimeRange::new(1000, 2000));
    }

    #[test]
    fn test_first_bind_of_untimed_item_still_resets() {
        let mut line = TimeableLine::active();
        assert!(line.bind(&timed(0, 0)));
        assert_eq!(line.range(), TimeRange::new(0, 0));
    }

    #[test]
    fn test_role_swap_moves_styles_not_positions() {
        let mut line = TimeableLine::active();
        line.bind(&timed(1000, 2000));

        line.set_position(MarkerSlot::B, 1500);
        assert_eq!(line.left_slot(), MarkerSlot::A);
        assert_eq!(line.range(), TimeRange::new(1000, 1500));

        line.set_position(MarkerSlot::B, 900);
        assert_eq!(line.left_slot(), MarkerSlot::B);
        assert_eq!(line.left().position(), 900);
        assert_eq!(line.right().position(), 1000);
        assert_eq!(line.left().style, MarkerStyle::LineStart);
        assert_eq!(line.left().feet, Feet::RIGHT);
        assert_eq!(line.right().style, MarkerStyle::LineEnd);
        assert_eq!(line.right().feet, Feet::LEFT);
        // the physical markers kept their positions
        assert_eq!(line.marker(MarkerSlot::A).position(), 1000);
        assert_eq!(line.marker(MarkerSlot::B).position(), 900);
    }

    #[test]
    fn test_role_invariant_over_many_moves() {
        let mut line = TimeableLine::active();
        line.bind(&timed(500, 600));
        let before = style_set(&line);

        let moves = [
            (MarkerSlot::A, 700),
            (MarkerSlot::B, 100),
            (MarkerSlot::A, 50),
            (MarkerSlot::B, 50),
            (MarkerSlot::A, 900),
            (MarkerSlot::B, -20),
        ];
        for (slot, pos) in moves {
            line.set_position(slot, pos);
            assert!(line.left().position() <= line.right().position());
            assert_eq!(style_set(&line), before);
        }
    }

    #[test]
    fn test_markers_in_role_order_and_contains() {
        let mut line = TimeableLine::inactive();
        line.bind(&timed(100, 400));
        line.set_position(MarkerSlot::A, 800);

        let (left, right) = line.markers();
        assert_eq!(left.position(), 400);
        assert_eq!(right.position(), 800);
        assert!(line.contains_marker_in(TimeRange::new(350, 450)));
        assert!(!line.contains_marker_in(TimeRange::new(450, 800)));
    }

    #[test]
    fn test_set_times_keeps_roles() {
        let mut line = TimeableLine::active();
        line.bind(&timed(5000, 6000));
        line.set_times(2000, 4000);
        assert_eq!(line.left_slot(), MarkerSlot::A);
        assert_eq!(line.range(), TimeRange::new(2000, 4000));
    }

    #[test]
    fn test_apply_to_item() {
        let mut item = timed(100, 400);
        let mut line = TimeableLine::active();
        line.bind(&item);
        line.set_position(MarkerSlot::B, 50);
        line.apply_to_item(&mut item);
        assert_eq!((item.start, item.end), (50, 100));

        // a different item is left untouched
        let mut other = timed(7, 9);
        line.apply_to_item(&mut other);
        assert_eq!((other.start, other.end), (7, 9));
    }
}
