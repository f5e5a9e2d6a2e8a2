use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use crate::instance::{BonusIncentive, DiscountReason, DynamicPricing, TourInstance};
use crate::risk::RiskConfig;

/// Discount to offer on an under-booked departure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountDecision {
    pub discount_percentage: u8,
    pub reason: DiscountReason,
    pub bonus_incentives: Vec<BonusIncentive>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Discount offered the moment a departure becomes at risk
    pub min_discount_percentage: u8,

    /// Ceiling reached with no time left and nobody booked
    pub max_discount_percentage: u8,

    /// Share of the discount range driven by time pressure; the rest follows the shortfall
    pub time_weight: f64,

    /// Horizon over which time pressure builds from 0 to 1
    pub pressure_window_hours: f64,

    /// Below this many hours the discount is tagged as last-minute
    pub last_minute_hours: f64,

    /// No discount is offered this close to departure
    pub cutoff_minutes: i64,

    /// Discount unlocking the first bonus incentive
    pub first_incentive_at: u8,

    /// Discount unlocking the second bonus incentive
    pub second_incentive_at: u8,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_discount_percentage: 10,
            max_discount_percentage: 40,
            time_weight: 0.6,
            pressure_window_hours: 168.0,
            last_minute_hours: 12.0,
            cutoff_minutes: 60,
            first_incentive_at: 20,
            second_incentive_at: 30,
        }
    }
}

/// Crowdfunding pricing: computes and applies rescue discounts for at-risk departures
#[derive(Debug, Clone, Default)]
pub struct DynamicPricingEngine {
    config: PricingConfig,
}

impl DynamicPricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Discount for `instance` with `hours_until_departure` left.
    ///
    /// Returns `None` once the cutoff before departure has been reached. An active
    /// discount is never lowered: the result is at least the current percentage.
    pub fn decide(&self, instance: &TourInstance, hours_until_departure: f64) -> Option<DiscountDecision> {
        let cutoff_hours = self.config.cutoff_minutes as f64 / 60.0;
        if hours_until_departure <= cutoff_hours {
            return None;
        }

        let mut discount = self.discount_for(
            instance.booked_spots,
            instance.min_participants,
            hours_until_departure,
        );
        if let Some(current) = instance.active_discount() {
            discount = discount.max(current);
        }

        let reason = if hours_until_departure < self.config.last_minute_hours {
            DiscountReason::LastMinute
        } else {
            DiscountReason::LowBookings
        };

        Some(DiscountDecision {
            discount_percentage: discount,
            reason,
            bonus_incentives: self.incentives_for(discount),
            valid_until: instance.departure_at() - Duration::minutes(self.config.cutoff_minutes),
        })
    }

    /// Raw curve: non-decreasing as hours shrink and as the shortfall grows
    pub fn discount_for(&self, booked: i32, min_participants: i32, hours_until_departure: f64) -> u8 {
        let floor = self.config.min_discount_percentage.min(100);
        let ceiling = self.config.max_discount_percentage.clamp(floor, 100);

        let time_pressure = if self.config.pressure_window_hours > 0.0 {
            (1.0 - hours_until_departure / self.config.pressure_window_hours).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let shortfall = RiskConfig::shortfall(booked, min_participants);
        let weight = self.config.time_weight.clamp(0.0, 1.0);
        let score = weight * time_pressure + (1.0 - weight) * shortfall;

        let span = f64::from(ceiling - floor);
        floor + (span * score).floor() as u8
    }

    pub fn incentives_for(&self, discount: u8) -> Vec<BonusIncentive> {
        if discount >= self.config.second_incentive_at {
            vec![BonusIncentive::FreePhotoPackage, BonusIncentive::PriorityCheckIn]
        } else if discount >= self.config.first_incentive_at {
            vec![BonusIncentive::FreePhotoPackage]
        } else {
            Vec::new()
        }
    }

    /// Write a decision onto the instance. `original_price` is never touched.
    pub fn apply(&self, instance: &mut TourInstance, decision: DiscountDecision, now: DateTime<Utc>) {
        let activated_at = instance
            .dynamic_pricing
            .as_ref()
            .filter(|p| p.is_active)
            .map(|p| p.activated_at)
            .unwrap_or(now);

        instance.price_per_person = discounted_price(instance.original_price, decision.discount_percentage);
        instance.dynamic_pricing = Some(DynamicPricing {
            is_active: true,
            discount_percentage: decision.discount_percentage,
            reason: decision.reason,
            bonus_incentives: decision.bonus_incentives,
            valid_until: decision.valid_until,
            activated_at,
        });
    }

    /// Withdraw a discount whose cutoff has passed and restore the list price.
    /// Returns true when something changed.
    pub fn expire(&self, instance: &mut TourInstance, now: DateTime<Utc>) -> bool {
        match instance.dynamic_pricing.as_mut() {
            Some(pricing) if pricing.is_active && now >= pricing.valid_until => {
                pricing.is_active = false;
                instance.price_per_person = instance.original_price;
                true
            }
            _ => false,
        }
    }
}

/// `round(original * (1 - discount / 100))` in integer minor units
pub fn discounted_price(original_price: i64, discount_percentage: u8) -> i64 {
    let keep = 100 - i64::from(discount_percentage.min(100));
    (original_price * keep + 50).div_euclid(100)
}
