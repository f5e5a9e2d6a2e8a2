use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use crate::instance::{InstanceStatus, TourInstance};
use crate::pricing::{DynamicPricingEngine, PricingConfig};
use crate::risk::RiskConfig;
use crate::tour::Tour;

/// Share of capacity below which a departure counts as almost full
const ALMOST_FULL_FRACTION: f64 = 0.20;

/// Provider request to put a tour on the calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: Option<i32>,
    pub min_participants: Option<i32>,
    pub price_override: Option<i64>,
}

/// Outcome of one status recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recompute {
    pub previous: InstanceStatus,
    pub status: InstanceStatus,
    /// A discount was switched on (not merely adjusted) by this pass
    pub pricing_activated: bool,
    /// Any stored field other than timestamps changed
    pub changed: bool,
}

/// Creates departures from templates and keeps their status in step with their counters
#[derive(Debug, Clone, Default)]
pub struct InstanceLifecycle {
    risk: RiskConfig,
    pricing: DynamicPricingEngine,
}

impl InstanceLifecycle {
    pub fn new(risk: RiskConfig, pricing: PricingConfig) -> Self {
        Self {
            risk,
            pricing: DynamicPricingEngine::new(pricing),
        }
    }

    /// Schedule a departure of `tour`
    pub fn create(
        &self,
        tour: &Tour,
        request: &ScheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<TourInstance, LifecycleError> {
        if !tour.is_active {
            return Err(LifecycleError::InactiveTour(tour.id));
        }

        // An end time earlier than the start is read as the next day
        if request.end_time == request.start_time {
            return Err(LifecycleError::InvalidSchedule(format!(
                "end time {} equals start time",
                request.end_time
            )));
        }

        let capacity = request.capacity.unwrap_or(tour.group_size.max);
        if capacity < tour.group_size.min || capacity > tour.group_size.max {
            return Err(LifecycleError::InvalidCapacity {
                capacity,
                min: tour.group_size.min,
                max: tour.group_size.max,
            });
        }

        let min_participants = request.min_participants.unwrap_or(tour.group_size.min);
        if min_participants < 1 || min_participants > capacity {
            return Err(LifecycleError::InvalidMinParticipants {
                min_participants,
                capacity,
            });
        }

        let price = request.price_override.unwrap_or(tour.base_price);
        if price < 0 {
            return Err(LifecycleError::InvalidSchedule(format!("negative price {}", price)));
        }

        let mut instance = TourInstance {
            id: Uuid::new_v4(),
            tour_id: tour.id,
            provider_id: tour.provider_id.clone(),
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            capacity,
            min_participants,
            booked_spots: 0,
            available_spots: capacity,
            seat_holds: Default::default(),
            price_per_person: price,
            original_price: price,
            currency: tour.currency.clone(),
            status: InstanceStatus::Scheduled,
            dynamic_pricing: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        if instance.departure_at() <= now {
            return Err(LifecycleError::InvalidSchedule(format!(
                "departure {} is not in the future",
                instance.departure_at()
            )));
        }

        self.recompute(&mut instance, now);
        Ok(instance)
    }

    /// Status implied by the counters and the remaining time. Terminal states are
    /// never produced here; they come from [`complete`](Self::complete) and
    /// [`cancel`](Self::cancel).
    pub fn derive_status(&self, instance: &TourInstance, hours_until_departure: f64) -> InstanceStatus {
        if instance.available_spots == 0 {
            InstanceStatus::Full
        } else if instance.booked_spots >= instance.min_participants {
            InstanceStatus::Confirmed
        } else if instance.available_fraction() < ALMOST_FULL_FRACTION {
            InstanceStatus::AlmostFull
        } else if self.risk.is_at_risk(
            instance.booked_spots,
            instance.min_participants,
            hours_until_departure,
        ) {
            InstanceStatus::AtRisk
        } else if instance.booked_spots == 0 {
            InstanceStatus::Scheduled
        } else {
            InstanceStatus::Filling
        }
    }

    /// Bring status and rescue pricing in line with the current counters.
    /// Idempotent for a fixed `now`; terminal instances are left alone.
    pub fn recompute(&self, instance: &mut TourInstance, now: DateTime<Utc>) -> Recompute {
        let previous = instance.status;
        if instance.is_terminal() {
            return Recompute {
                previous,
                status: previous,
                pricing_activated: false,
                changed: false,
            };
        }

        let pricing_before = instance.dynamic_pricing.clone();
        let price_before = instance.price_per_person;
        let was_active = instance.active_discount().is_some();

        if self.pricing.expire(instance, now) {
            tracing::info!(
                "Rescue discount on instance {} expired at cutoff, price restored to {}",
                instance.id,
                instance.original_price
            );
        }

        let hours = instance.hours_until_departure(now);
        let status = self.derive_status(instance, hours);

        if status == InstanceStatus::AtRisk {
            if let Some(decision) = self.pricing.decide(instance, hours) {
                self.pricing.apply(instance, decision, now);
            }
        }

        instance.status = status;
        let pricing_activated = !was_active && instance.active_discount().is_some();
        let changed = previous != status
            || price_before != instance.price_per_person
            || pricing_before != instance.dynamic_pricing;

        if changed {
            instance.updated_at = now;
        }

        if pricing_activated {
            tracing::info!(
                "Rescue pricing activated on instance {}: {}% off, {} -> {}",
                instance.id,
                instance.active_discount().unwrap_or(0),
                instance.original_price,
                instance.price_per_person
            );
        }

        if previous != status {
            tracing::debug!("Instance {} status {} -> {}", instance.id, previous, status);
        }

        Recompute {
            previous,
            status,
            pricing_activated,
            changed,
        }
    }

    /// Departure time has passed and the instance is still open
    pub fn is_due_for_completion(&self, instance: &TourInstance, now: DateTime<Utc>) -> bool {
        !instance.is_terminal() && instance.departure_at() <= now
    }

    /// Transition: open → Completed (departure has passed)
    pub fn complete(&self, instance: &mut TourInstance, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if instance.is_terminal() {
            return Err(LifecycleError::InvalidTransition {
                from: instance.status,
                to: InstanceStatus::Completed,
            });
        }

        if instance.departure_at() > now {
            return Err(LifecycleError::NotDeparted(instance.id));
        }

        instance.status = InstanceStatus::Completed;
        instance.updated_at = now;
        Ok(())
    }

    /// Transition: open → Cancelled (provider or system decision)
    pub fn cancel(
        &self,
        instance: &mut TourInstance,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if instance.is_terminal() {
            return Err(LifecycleError::InvalidTransition {
                from: instance.status,
                to: InstanceStatus::Cancelled,
            });
        }

        instance.status = InstanceStatus::Cancelled;
        instance.cancellation_reason = Some(reason);
        if let Some(pricing) = instance.dynamic_pricing.as_mut() {
            pricing.is_active = false;
        }
        instance.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Tour is not active: {0}")]
    InactiveTour(Uuid),

    #[error("Capacity {capacity} outside group size bounds {min}..={max}")]
    InvalidCapacity {
        capacity: i32,
        min: i32,
        max: i32,
    },

    #[error("Minimum participants {min_participants} invalid for capacity {capacity}")]
    InvalidMinParticipants {
        min_participants: i32,
        capacity: i32,
    },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: InstanceStatus,
        to: InstanceStatus,
    },

    #[error("Instance has not departed yet: {0}")]
    NotDeparted(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CapacityLedger;
    use crate::policy::CancellationPolicy;
    use crate::tour::GroupSize;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()
    }

    fn tour() -> Tour {
        Tour::new(
            "provider-1".to_string(),
            "Canyon Hike".to_string(),
            8000,
            "EUR".to_string(),
            GroupSize { min: 2, max: 20 },
            CancellationPolicy::standard(),
        )
    }

    fn schedule(departure: DateTime<Utc>, capacity: i32, min: i32) -> ScheduleRequest {
        ScheduleRequest {
            date: departure.date_naive(),
            start_time: departure.time(),
            end_time: departure.time() + Duration::hours(3),
            capacity: Some(capacity),
            min_participants: Some(min),
            price_override: None,
        }
    }

    fn instance_with(capacity: i32, min: i32, booked: i32, departure_in: Duration) -> TourInstance {
        let lifecycle = InstanceLifecycle::default();
        let mut instance = lifecycle
            .create(&tour(), &schedule(now() + departure_in, capacity, min), now())
            .unwrap();
        if booked > 0 {
            CapacityLedger::reserve(&mut instance, Uuid::new_v4(), booked).unwrap();
        }
        instance
    }

    #[test]
    fn test_create_from_template() {
        let instance = instance_with(10, 4, 0, Duration::days(30));
        assert_eq!(instance.capacity, 10);
        assert_eq!(instance.available_spots, 10);
        assert_eq!(instance.price_per_person, 8000);
        assert_eq!(instance.original_price, 8000);
        assert_eq!(instance.status, InstanceStatus::Scheduled);
    }

    #[test]
    fn test_create_defaults_to_group_size() {
        let lifecycle = InstanceLifecycle::default();
        let mut request = schedule(now() + Duration::days(30), 0, 0);
        request.capacity = None;
        request.min_participants = None;
        request.price_override = Some(7000);

        let instance = lifecycle.create(&tour(), &request, now()).unwrap();
        assert_eq!(instance.capacity, 20);
        assert_eq!(instance.min_participants, 2);
        assert_eq!(instance.original_price, 7000);
    }

    #[test]
    fn test_create_rejects_bad_capacity() {
        let lifecycle = InstanceLifecycle::default();
        let err = lifecycle
            .create(&tour(), &schedule(now() + Duration::days(3), 1, 1), now())
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidCapacity { capacity: 1, .. }));

        let err = lifecycle
            .create(&tour(), &schedule(now() + Duration::days(3), 10, 11), now())
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidMinParticipants { .. }));
    }

    #[test]
    fn test_create_accepts_overnight_departure() {
        let lifecycle = InstanceLifecycle::default();
        let departure = Utc.with_ymd_and_hms(2026, 9, 10, 21, 0, 0).unwrap();
        let mut request = schedule(departure, 10, 2);
        request.end_time = NaiveTime::from_hms_opt(2, 0, 0).unwrap();

        let instance = lifecycle.create(&tour(), &request, now()).unwrap();
        assert_eq!(instance.departure_at(), departure);
        assert_eq!(instance.end_time, request.end_time);

        request.end_time = request.start_time;
        assert!(matches!(
            lifecycle.create(&tour(), &request, now()),
            Err(LifecycleError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_create_rejects_past_departure() {
        let lifecycle = InstanceLifecycle::default();
        let err = lifecycle
            .create(&tour(), &schedule(now() - Duration::hours(1), 10, 2), now())
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidSchedule(_)));
    }

    #[test]
    fn test_status_ordering() {
        let lifecycle = InstanceLifecycle::default();
        let far = Duration::days(30);

        let mut full = instance_with(10, 4, 10, far);
        assert_eq!(lifecycle.recompute(&mut full, now()).status, InstanceStatus::Full);

        let mut confirmed = instance_with(10, 4, 5, far);
        assert_eq!(lifecycle.recompute(&mut confirmed, now()).status, InstanceStatus::Confirmed);

        // 9 of 10 booked but a minimum of 10: under 20% left
        let mut almost = instance_with(10, 10, 9, far);
        assert_eq!(lifecycle.recompute(&mut almost, now()).status, InstanceStatus::AlmostFull);

        let mut filling = instance_with(10, 4, 2, far);
        assert_eq!(lifecycle.recompute(&mut filling, now()).status, InstanceStatus::Filling);

        let mut empty = instance_with(10, 4, 0, far);
        assert_eq!(lifecycle.recompute(&mut empty, now()).status, InstanceStatus::Scheduled);
    }

    #[test]
    fn test_risk_rescue_activates_discount() {
        let lifecycle = InstanceLifecycle::default();
        let mut instance = instance_with(12, 6, 0, Duration::days(30));
        CapacityLedger::reserve(&mut instance, Uuid::new_v4(), 2).unwrap();

        let later = instance.departure_at() - Duration::hours(20);
        let outcome = lifecycle.recompute(&mut instance, later);

        assert_eq!(outcome.status, InstanceStatus::AtRisk);
        assert!(outcome.pricing_activated);
        let discount = instance.active_discount().unwrap();
        assert!(discount > 0);
        assert!(instance.price_per_person < instance.original_price);
        assert_eq!(instance.original_price, 8000);
    }

    #[test]
    fn test_discount_grows_as_departure_nears() {
        let lifecycle = InstanceLifecycle::default();
        let mut instance = instance_with(12, 6, 2, Duration::days(30));
        let departure = instance.departure_at();

        let mut last = 0;
        for hours_left in [40, 30, 20, 10, 5, 2] {
            lifecycle.recompute(&mut instance, departure - Duration::hours(hours_left));
            let discount = instance.active_discount().unwrap();
            assert!(discount >= last, "discount dropped at {}h", hours_left);
            last = discount;
        }
    }

    #[test]
    fn test_discount_expires_at_cutoff() {
        let lifecycle = InstanceLifecycle::default();
        let mut instance = instance_with(12, 6, 2, Duration::days(30));
        let departure = instance.departure_at();

        lifecycle.recompute(&mut instance, departure - Duration::hours(5));
        assert!(instance.active_discount().is_some());

        let outcome = lifecycle.recompute(&mut instance, departure - Duration::minutes(30));
        assert!(outcome.changed);
        assert_eq!(instance.active_discount(), None);
        assert_eq!(instance.price_per_person, instance.original_price);
        assert_eq!(instance.status, InstanceStatus::AtRisk);
    }

    #[test]
    fn test_discount_kept_once_rescued() {
        let lifecycle = InstanceLifecycle::default();
        let mut instance = instance_with(12, 6, 2, Duration::days(30));
        let at = instance.departure_at() - Duration::hours(20);
        lifecycle.recompute(&mut instance, at);
        let discount = instance.active_discount().unwrap();

        CapacityLedger::reserve(&mut instance, Uuid::new_v4(), 4).unwrap();
        let outcome = lifecycle.recompute(&mut instance, at);
        assert_eq!(outcome.status, InstanceStatus::Confirmed);
        assert_eq!(instance.active_discount(), Some(discount));
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let lifecycle = InstanceLifecycle::default();
        let mut instance = instance_with(10, 4, 3, Duration::days(2));

        lifecycle.cancel(&mut instance, "weather".to_string(), now()).unwrap();
        let outcome = lifecycle.recompute(&mut instance, now());
        assert_eq!(outcome.status, InstanceStatus::Cancelled);
        assert!(!outcome.changed);

        assert!(matches!(
            lifecycle.cancel(&mut instance, "again".to_string(), now()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(lifecycle.complete(&mut instance, now() + Duration::days(3)).is_err());
    }

    #[test]
    fn test_complete_requires_departure() {
        let lifecycle = InstanceLifecycle::default();
        let mut instance = instance_with(10, 4, 3, Duration::days(2));

        assert!(!lifecycle.is_due_for_completion(&instance, now()));
        assert_eq!(
            lifecycle.complete(&mut instance, now()),
            Err(LifecycleError::NotDeparted(instance.id))
        );

        let after = instance.departure_at() + Duration::minutes(1);
        assert!(lifecycle.is_due_for_completion(&instance, after));
        lifecycle.complete(&mut instance, after).unwrap();
        assert_eq!(instance.status, InstanceStatus::Completed);
    }

    proptest! {
        #[test]
        fn prop_recompute_is_idempotent(
            capacity in 2i32..40,
            min_seed in 0i32..40,
            booked_seed in 0i32..40,
            hours in 0.1f64..400.0,
        ) {
            let min = 1 + min_seed % capacity;
            let booked = booked_seed % (capacity + 1);
            let lifecycle = InstanceLifecycle::default();
            let mut instance = instance_with(10, 2, 0, Duration::days(30));
            instance.capacity = capacity;
            instance.min_participants = min;
            instance.booked_spots = booked;
            instance.available_spots = capacity - booked;

            let at = instance.departure_at() - Duration::seconds((hours * 3600.0) as i64);
            let first = lifecycle.recompute(&mut instance, at);
            let snapshot = instance.clone();
            let second = lifecycle.recompute(&mut instance, at);

            prop_assert_eq!(first.status, second.status);
            prop_assert!(!second.changed);
            prop_assert_eq!(snapshot, instance);
        }
    }
}
