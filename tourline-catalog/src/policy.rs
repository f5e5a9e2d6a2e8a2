use serde::{Deserialize, Serialize};

/// One refund threshold: cancelling at least `hours_before_departure` hours out
/// refunds `refund_percentage` percent of the amount paid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CancellationRule {
    pub hours_before_departure: u32,
    pub refund_percentage: u8,
}

impl CancellationRule {
    pub fn new(hours_before_departure: u32, refund_percentage: u8) -> Self {
        Self {
            hours_before_departure,
            refund_percentage,
        }
    }
}

/// Ordered refund rules of a tour. The first rule whose threshold is met wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CancellationPolicy {
    pub rules: Vec<CancellationRule>,
}

impl CancellationPolicy {
    pub fn new(rules: Vec<CancellationRule>) -> Self {
        Self { rules }
    }

    /// Policy used when a provider does not configure one: full refund a week out,
    /// half from a day out, nothing inside the last 24 hours.
    pub fn standard() -> Self {
        Self::new(vec![
            CancellationRule::new(168, 100),
            CancellationRule::new(24, 50),
            CancellationRule::new(0, 0),
        ])
    }

    /// Refund percentage for a cancellation `hours_until_departure` hours before the start.
    ///
    /// Rules are scanned in the order they were supplied. With rules sorted by
    /// descending threshold this yields the most generous applicable rule.
    pub fn refund_percentage(&self, hours_until_departure: f64) -> u8 {
        self.rules
            .iter()
            .find(|rule| hours_until_departure >= f64::from(rule.hours_before_departure))
            .map(|rule| rule.refund_percentage)
            .unwrap_or(0)
    }

    /// Sort rules by descending threshold so the linear scan picks the most generous match.
    pub fn normalized(mut self) -> Self {
        self.rules
            .sort_by(|a, b| b.hours_before_departure.cmp(&a.hours_before_departure));
        self
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for rule in &self.rules {
            if rule.refund_percentage > 100 {
                return Err(PolicyError::InvalidPercentage(rule.refund_percentage));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.hours_before_departure) {
                return Err(PolicyError::DuplicateThreshold(rule.hours_before_departure));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Refund percentage out of range: {0}")]
    InvalidPercentage(u8),

    #[error("Duplicate cancellation threshold: {0}h")]
    DuplicateThreshold(u32),
}
