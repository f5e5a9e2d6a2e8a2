use serde::{Deserialize, Serialize};

/// Thresholds deciding when a departure is unlikely to reach its minimum group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Inside this window any shortfall against the minimum counts as risk
    pub short_window_hours: f64,

    /// Inside this window only a deep shortfall counts as risk
    pub extended_window_hours: f64,

    /// Booked share of the minimum below which the extended window applies
    pub extended_booked_ratio: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            short_window_hours: 48.0,
            extended_window_hours: 168.0,
            extended_booked_ratio: 0.5,
        }
    }
}

impl RiskConfig {
    /// Whether a departure with `booked` of `min_participants` seats sold,
    /// `hours_until_departure` hours out, needs rescuing.
    ///
    /// Shrinking the remaining time or the booked count never clears risk.
    pub fn is_at_risk(&self, booked: i32, min_participants: i32, hours_until_departure: f64) -> bool {
        if hours_until_departure <= 0.0 || min_participants <= 0 || booked >= min_participants {
            return false;
        }

        if hours_until_departure < self.short_window_hours {
            return true;
        }

        let booked_ratio = booked as f64 / min_participants as f64;
        hours_until_departure < self.extended_window_hours && booked_ratio < self.extended_booked_ratio
    }

    /// Share of the minimum still missing, in [0, 1]
    pub fn shortfall(booked: i32, min_participants: i32) -> f64 {
        if min_participants <= 0 {
            return 0.0;
        }
        (1.0 - booked as f64 / min_participants as f64).clamp(0.0, 1.0)
    }
}
