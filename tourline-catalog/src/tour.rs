use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use crate::policy::{CancellationPolicy, PolicyError};

/// Bounds for the capacity of every departure scheduled from a tour
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupSize {
    pub min: i32,
    pub max: i32,
}

/// Reusable tour template owned by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    pub id: Uuid,
    pub provider_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Price per person in minor currency units
    pub base_price: i64,
    pub currency: String,
    pub group_size: GroupSize,
    pub cancellation_policy: CancellationPolicy,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Tour {
    pub fn new(
        provider_id: String,
        title: String,
        base_price: i64,
        currency: String,
        group_size: GroupSize,
        cancellation_policy: CancellationPolicy,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id,
            title,
            description: None,
            base_price,
            currency,
            group_size,
            cancellation_policy,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), TourError> {
        if self.base_price < 0 {
            return Err(TourError::InvalidPrice(self.base_price));
        }

        if self.group_size.min < 1 || self.group_size.max < self.group_size.min {
            return Err(TourError::InvalidGroupSize {
                min: self.group_size.min,
                max: self.group_size.max,
            });
        }

        if self.currency.trim().is_empty() {
            return Err(TourError::MissingCurrency);
        }

        self.cancellation_policy.validate()?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TourError {
    #[error("Invalid base price: {0}")]
    InvalidPrice(i64),

    #[error("Invalid group size: min {min}, max {max}")]
    InvalidGroupSize {
        min: i32,
        max: i32,
    },

    #[error("Tour currency is required")]
    MissingCurrency,

    #[error("Invalid cancellation policy: {0}")]
    Policy(#[from] PolicyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walking_tour() -> Tour {
        Tour::new(
            "provider-1".to_string(),
            "Old Town Walk".to_string(),
            4500,
            "EUR".to_string(),
            GroupSize { min: 4, max: 12 },
            CancellationPolicy::standard(),
        )
    }

    #[test]
    fn test_valid_tour() {
        assert!(walking_tour().validate().is_ok());
    }

    #[test]
    fn test_group_size_bounds() {
        let mut tour = walking_tour();
        tour.group_size = GroupSize { min: 8, max: 4 };
        assert!(matches!(tour.validate(), Err(TourError::InvalidGroupSize { .. })));

        tour.group_size = GroupSize { min: 0, max: 4 };
        assert!(tour.validate().is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut tour = walking_tour();
        tour.base_price = -1;
        assert!(matches!(tour.validate(), Err(TourError::InvalidPrice(-1))));
    }
}
