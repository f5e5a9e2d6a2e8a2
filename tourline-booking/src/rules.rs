use serde::{Deserialize, Serialize};
use chrono::Duration;

/// Operational knobs of the booking workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRules {
    /// Revision conflicts tolerated on one document before giving up
    #[serde(default = "default_conflict_retries")]
    pub max_conflict_retries: u32,

    /// How long an unpaid booking holds its seats
    #[serde(default = "default_payment_hold")]
    pub payment_hold_seconds: u64,

    /// Cadence of the background status sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_conflict_retries() -> u32 { 5 }
fn default_payment_hold() -> u64 { 900 }
fn default_sweep_interval() -> u64 { 300 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_conflict_retries(),
            payment_hold_seconds: default_payment_hold(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl BookingRules {
    pub fn payment_hold(&self) -> Duration {
        Duration::seconds(self.payment_hold_seconds as i64)
    }
}
