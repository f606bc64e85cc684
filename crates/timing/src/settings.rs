/// User-tunable timing options
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Ms, Result, TimingError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Commit after every marker move
    pub auto_commit: bool,

    /// Added before the start by "add lead-in"
    pub lead_in: Ms,

    /// Added after the end by "add lead-out"
    pub lead_out: Ms,

    /// Duration given to untimed lines when advancing
    pub default_duration: Ms,

    /// Snap by default; the no-snap modifier inverts this
    pub snap_enabled: bool,

    /// Snap range in ms
    pub snap_distance: Ms,

    /// How close a click must be to grab a marker, in ms
    pub drag_sensitivity: Ms,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            auto_commit: true,
            lead_in: 200,
            lead_out: 300,
            default_duration: 2000,
            snap_enabled: true,
            snap_distance: 50,
            drag_sensitivity: 30,
        }
    }
}

impl TimingSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings: TimingSettings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("lead_in", self.lead_in),
            ("lead_out", self.lead_out),
            ("default_duration", self.default_duration),
            ("snap_distance", self.snap_distance),
            ("drag_sensitivity", self.drag_sensitivity),
        ];
        for (name, value) in checks {
            if value < 0 {
                return Err(TimingError::Settings(format!(
                    "{} must not be negative (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Snap range for a drag, given whether the no-snap modifier is held.
    pub fn effective_snap_range(&self, modifier: bool) -> Ms {
        if self.snap_enabled != modifier {
            self.snap_distance
        } else {
            0
        }
    }
}
