use serde::{Deserialize, Serialize};

use crate::Ms;

/// Half-open millisecond interval `[begin, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct TimeRange {
    begin: Ms,
    end: Ms,
}

impl TimeRange {
    /// Build a range from two bounds given in either order.
    pub fn new(a: Ms, b: Ms) -> Self {
        if a <= b {
            Self { begin: a, end: b }
        } else {
            Self { begin: b, end: a }
        }
    }

    /// Range of `radius` ms on either side of `center`.
    pub fn around(center: Ms, radius: Ms) -> Self {
        Self::new(center - radius, center + radius)
    }

    pub fn begin(&self) -> Ms {
        self.begin
    }

    pub fn end(&self) -> Ms {
        self.end
    }

    pub fn length(&self) -> Ms {
        self.end - self.begin
    }

    pub fn contains(&self, ms: Ms) -> bool {
        ms >= self.begin && ms < self.end
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.begin < other.end && other.begin < self.end
    }
}
