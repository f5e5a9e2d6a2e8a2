use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;
use tracing::{debug, error, info, warn};
use tourline_catalog::{
    CapacityLedger, InstanceLifecycle, InstanceStatus, Recompute, ScheduleRequest, Tour, TourInstance,
};
use tourline_core::payment::{PaymentAdapter, PaymentIntent, PaymentStatus};
use tourline_core::{Clock, StoreError};
use tourline_shared::models::events::{
    BookingCancelledEvent, BookingCreatedEvent, PricingActivatedEvent,
};
use tourline_shared::TourEvent;
use crate::error::BookingError;
use crate::models::{Booking, BookingStatus, CancelledBy, Customer};
use crate::orchestrator::PaymentOrchestrator;
use crate::repository::{BookingRepository, InstanceRepository, TourCatalog};
use crate::rules::BookingRules;

const EVENT_BUFFER: usize = 256;

/// A created booking and the payment handle the customer must complete
#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub payment: PaymentIntent,
}

/// Orchestrates bookings, payments and cancellations against departures.
///
/// Every document mutation is read, transform, compare-and-set. A revision
/// conflict re-reads and re-runs the transform, so checks such as seat
/// availability are always made against the latest stored state.
pub struct BookingWorkflow {
    pub(crate) catalog: Arc<dyn TourCatalog>,
    pub(crate) instances: Arc<dyn InstanceRepository>,
    pub(crate) bookings: Arc<dyn BookingRepository>,
    pub(crate) payments: PaymentOrchestrator,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) lifecycle: InstanceLifecycle,
    pub(crate) rules: BookingRules,
    events: broadcast::Sender<TourEvent>,
}

impl BookingWorkflow {
    pub fn new(
        catalog: Arc<dyn TourCatalog>,
        instances: Arc<dyn InstanceRepository>,
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            catalog,
            instances,
            bookings,
            payments: PaymentOrchestrator::new(payments),
            clock,
            lifecycle: InstanceLifecycle::default(),
            rules: BookingRules::default(),
            events,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: InstanceLifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_rules(mut self, rules: BookingRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TourEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Catalog and scheduling
    // ------------------------------------------------------------------

    /// Validate and store a tour template. Refund rules are stored sorted by
    /// descending threshold.
    pub async fn register_tour(&self, mut tour: Tour) -> Result<Tour, BookingError> {
        tour.validate()?;
        tour.cancellation_policy = tour.cancellation_policy.normalized();
        self.catalog.save_tour(&tour).await?;
        info!("Tour {} registered for provider {}", tour.id, tour.provider_id);
        Ok(tour)
    }

    pub async fn get_tour(&self, tour_id: Uuid) -> Result<Tour, BookingError> {
        self.catalog
            .get_tour(tour_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("tour {}", tour_id)))
    }

    pub async fn list_provider_tours(&self, provider_id: &str) -> Result<Vec<Tour>, BookingError> {
        Ok(self.catalog.list_tours(provider_id).await?)
    }

    /// Put a departure of `tour_id` on the calendar
    pub async fn schedule_instance(
        &self,
        tour_id: Uuid,
        request: ScheduleRequest,
    ) -> Result<TourInstance, BookingError> {
        let tour = self.get_tour(tour_id).await?;
        let instance = self.lifecycle.create(&tour, &request, self.clock.now())?;
        self.instances.insert_instance(&instance).await?;

        info!(
            "Instance {} of tour {} scheduled for {} {} ({} seats)",
            instance.id, tour.id, instance.date, instance.start_time, instance.capacity
        );
        self.publish(TourEvent::InstanceUpdated(instance.to_event()));
        Ok(instance)
    }

    pub async fn get_instance(&self, instance_id: Uuid) -> Result<TourInstance, BookingError> {
        self.instances
            .get_instance(instance_id)
            .await?
            .map(|doc| doc.value)
            .ok_or_else(|| BookingError::NotFound(format!("instance {}", instance_id)))
    }

    pub async fn list_tour_instances(&self, tour_id: Uuid) -> Result<Vec<TourInstance>, BookingError> {
        Ok(self.instances.list_instances_by_tour(tour_id).await?)
    }

    /// Re-derive status and rescue pricing of one departure
    pub async fn recompute_instance(&self, instance_id: Uuid) -> Result<TourInstance, BookingError> {
        let lifecycle = &self.lifecycle;
        let (instance, outcome) = self
            .mutate_instance(instance_id, |instance, now| Ok(lifecycle.recompute(instance, now)))
            .await?;

        if outcome.changed {
            self.publish_instance(&instance, &outcome);
        }
        Ok(instance)
    }

    /// Provider/system cancellation of a whole departure. Every open booking on it
    /// is cancelled by the system with a full refund.
    ///
    /// Calling it again on a cancelled instance that still holds seats finishes
    /// the cascade instead of failing.
    pub async fn cancel_instance(
        &self,
        instance_id: Uuid,
        reason: String,
    ) -> Result<(TourInstance, Vec<Booking>), BookingError> {
        let existing = self.get_instance(instance_id).await?;
        let reason = if existing.status == InstanceStatus::Cancelled && !existing.seat_holds.is_empty() {
            warn!(
                "Instance {} was cancelled with {} bookings still holding seats, resuming",
                instance_id,
                existing.seat_holds.len()
            );
            existing.cancellation_reason.unwrap_or(reason)
        } else {
            let lifecycle = &self.lifecycle;
            self.mutate_instance(instance_id, |instance, now| {
                lifecycle.cancel(instance, reason.clone(), now)?;
                Ok(())
            })
            .await?;
            info!("Instance {} cancelled: {}", instance_id, reason);
            reason
        };

        let cancelled = self.cascade_cancellation(instance_id, &reason).await?;

        let instance = self.get_instance(instance_id).await?;
        self.publish(TourEvent::InstanceUpdated(instance.to_event()));
        Ok((instance, cancelled))
    }

    async fn cascade_cancellation(
        &self,
        instance_id: Uuid,
        reason: &str,
    ) -> Result<Vec<Booking>, BookingError> {
        let instance = self.get_instance(instance_id).await?;

        let mut cancelled = Vec::new();
        for booking in self.bookings.list_bookings_by_instance(instance_id).await? {
            if !booking.is_active() && !instance.holds_seats_for(booking.id) {
                continue;
            }

            match self
                .cancel_booking(
                    booking.id,
                    CancelledBy::System,
                    Some(format!("instance_cancelled: {}", reason)),
                )
                .await
            {
                Ok(booking) => cancelled.push(booking),
                Err(BookingError::AlreadyCancelled(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(cancelled)
    }

    // ------------------------------------------------------------------
    // Bookings
    // ------------------------------------------------------------------

    /// Reserve `number_of_people` seats for `customer` at the current price.
    ///
    /// Seats are held from this point, before payment, so that two customers can
    /// never pay for the same last seat.
    pub async fn create_booking(
        &self,
        instance_id: Uuid,
        number_of_people: i32,
        customer: Customer,
    ) -> Result<BookingReceipt, BookingError> {
        if number_of_people <= 0 {
            return Err(BookingError::InvalidRequest(format!(
                "number of people must be positive, got {}",
                number_of_people
            )));
        }

        let booking_id = Uuid::new_v4();
        let lifecycle = &self.lifecycle;
        let (instance, (booking, outcome)) = self
            .mutate_instance(instance_id, |instance, now| {
                if instance.is_terminal() {
                    return Err(BookingError::transition(instance.status, "booked"));
                }
                if instance.departure_at() <= now {
                    return Err(BookingError::transition("departed", "booked"));
                }

                // Price is locked before the reservation can move it
                let booking = Booking::new(booking_id, instance, &customer, number_of_people, now);
                CapacityLedger::reserve(instance, booking_id, number_of_people)?;
                let outcome = lifecycle.recompute(instance, now);
                Ok((booking, outcome))
            })
            .await?;

        if let Err(err) = self.bookings.insert_booking(&booking).await {
            error!(
                "Failed to store booking {} on instance {}, returning {} seats: {}",
                booking.id, instance_id, number_of_people, err
            );
            if let Err(release_err) = self.release_seats(instance_id, booking.id).await {
                error!(
                    "Could not return seats of unsaved booking {}: {}",
                    booking.id, release_err
                );
            }
            return Err(err.into());
        }

        // A cancellation cascade that listed bookings before the insert missed this one
        let current = self.get_instance(instance_id).await?;
        if current.status == InstanceStatus::Cancelled {
            warn!(
                "Instance {} was cancelled while booking {} was being stored, dropping it",
                instance_id, booking.id
            );
            let reason = format!(
                "instance_cancelled: {}",
                current.cancellation_reason.as_deref().unwrap_or("unspecified")
            );
            match self.cancel_booking(booking.id, CancelledBy::System, Some(reason)).await {
                Ok(_) | Err(BookingError::AlreadyCancelled(_)) => {}
                Err(e) => return Err(e),
            }
            return Err(BookingError::transition(current.status, "booked"));
        }

        info!(
            "Booking {} created: {} people at {} {} on instance {} (customer {:?})",
            booking.id,
            booking.number_of_people,
            booking.price_per_person,
            booking.currency,
            instance_id,
            booking.customer_email
        );
        self.publish_instance(&instance, &outcome);
        self.publish(TourEvent::BookingCreated(BookingCreatedEvent {
            booking_id: booking.id,
            instance_id,
            customer_id: booking.customer_id.clone(),
            number_of_people: booking.number_of_people,
            total_amount: booking.total_amount,
            timestamp: booking.created_at.timestamp(),
        }));

        // A failure here leaves the booking pending; the payment hold sweep returns its seats.
        let payment = self.payments.initialize_payment(&booking).await?;
        let (booking, ()) = self
            .mutate_booking(booking.id, |booking, _| {
                booking.payment_reference = Some(payment.id.clone());
                Ok(())
            })
            .await?;

        Ok(BookingReceipt { booking, payment })
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .map(|doc| doc.value)
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))
    }

    pub async fn list_customer_bookings(&self, customer_id: &str) -> Result<Vec<Booking>, BookingError> {
        Ok(self.bookings.list_bookings_by_customer(customer_id).await?)
    }

    /// Payment went through: PendingPayment → Confirmed. Seats were already held.
    ///
    /// A booking whose instance has been cancelled is not confirmed; it is
    /// cancelled with a full refund instead.
    pub async fn confirm_payment(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let current = self.get_booking(booking_id).await?;
        let instance = self.get_instance(current.tour_instance_id).await?;
        if instance.status == InstanceStatus::Cancelled {
            match self
                .cancel_booking(booking_id, CancelledBy::System, Some("instance_cancelled".to_string()))
                .await
            {
                Ok(_) | Err(BookingError::AlreadyCancelled(_)) => {}
                Err(e) => return Err(e),
            }
            return Err(BookingError::transition("cancelled instance", BookingStatus::Confirmed));
        }

        let (booking, ()) = self
            .mutate_booking(booking_id, |booking, now| booking.confirm(now))
            .await?;
        info!("Booking {} confirmed", booking_id);
        Ok(booking)
    }

    /// Payment failed or was abandoned: cancel and return the seats
    pub async fn reject_payment(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        match self
            .cancel_booking(booking_id, CancelledBy::System, Some("payment_rejected".to_string()))
            .await
        {
            Err(BookingError::AlreadyCancelled(_)) => self.get_booking(booking_id).await,
            other => other,
        }
    }

    /// Resolve a provider notification about `intent_id`. Returns the affected
    /// booking, or `None` while the payment is still in flight.
    pub async fn handle_payment_update(&self, intent_id: &str) -> Result<Option<Booking>, BookingError> {
        let intent = self.payments.process_status_update(intent_id).await?;

        match intent.status {
            PaymentStatus::Succeeded => Ok(Some(self.confirm_payment(intent.booking_id).await?)),
            PaymentStatus::Failed | PaymentStatus::Canceled => {
                Ok(Some(self.reject_payment(intent.booking_id).await?))
            }
            _ => Ok(None),
        }
    }

    /// Cancel a booking, refund according to the tour policy and return its seats
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        cancelled_by: CancelledBy,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        self.cancel_booking_inner(booking_id, cancelled_by, reason, false).await
    }

    pub(crate) async fn cancel_booking_inner(
        &self,
        booking_id: Uuid,
        cancelled_by: CancelledBy,
        reason: Option<String>,
        only_if_pending: bool,
    ) -> Result<Booking, BookingError> {
        let current = self.get_booking(booking_id).await?;
        let instance = self.get_instance(current.tour_instance_id).await?;
        match current.status {
            BookingStatus::Cancelled if instance.holds_seats_for(booking_id) => {
                warn!("Booking {} is cancelled but still holds seats, releasing them", booking_id);
                return self.finish_cancellation(current).await;
            }
            BookingStatus::Cancelled => return Err(BookingError::AlreadyCancelled(booking_id)),
            BookingStatus::Completed => {
                return Err(BookingError::transition(current.status, BookingStatus::Cancelled))
            }
            _ => {}
        }

        if instance.status == InstanceStatus::Completed {
            return Err(BookingError::transition("completed instance", "cancelled booking"));
        }

        let refund_percentage = self
            .refund_percentage_for(&instance, cancelled_by, self.clock.now())
            .await?;

        let (booking, ()) = self
            .mutate_booking(booking_id, |booking, now| {
                if only_if_pending && booking.status != BookingStatus::PendingPayment {
                    return Err(BookingError::transition(booking.status, BookingStatus::Cancelled));
                }
                booking.cancel(cancelled_by, reason.clone(), refund_percentage, now)
            })
            .await?;

        self.finish_cancellation(booking).await
    }

    /// Give back the seats of a cancelled booking and announce it.
    /// Safe to repeat: the ledger releases a booking's hold at most once.
    pub(crate) async fn finish_cancellation(&self, booking: Booking) -> Result<Booking, BookingError> {
        let (instance, (released, outcome)) = self
            .release_seats(booking.tour_instance_id, booking.id)
            .await?;
        if released == 0 {
            debug!("Seats of booking {} were already returned", booking.id);
            return Ok(booking);
        }

        let cancellation = booking.cancellation.as_ref();
        let cancelled_by = cancellation.map(|c| c.cancelled_by).unwrap_or(CancelledBy::System);
        let refund_percentage = cancellation.map(|c| c.refund_percentage).unwrap_or(0);
        info!(
            "Booking {} cancelled by {}: {} seats returned, refund {}%",
            booking.id,
            cancelled_by.as_str(),
            released,
            refund_percentage
        );
        self.publish(TourEvent::BookingCancelled(BookingCancelledEvent {
            booking_id: booking.id,
            instance_id: booking.tour_instance_id,
            cancelled_by: cancelled_by.as_str().to_string(),
            refund_percentage,
            refund_amount: cancellation.map(|c| c.refund_amount).unwrap_or(0),
            timestamp: booking.updated_at.timestamp(),
        }));
        self.publish_instance(&instance, &outcome);

        Ok(booking)
    }

    async fn refund_percentage_for(
        &self,
        instance: &TourInstance,
        cancelled_by: CancelledBy,
        now: DateTime<Utc>,
    ) -> Result<u8, BookingError> {
        if cancelled_by == CancelledBy::System || instance.status == InstanceStatus::Cancelled {
            return Ok(100);
        }

        let tour = self.get_tour(instance.tour_id).await?;
        Ok(tour
            .cancellation_policy
            .refund_percentage(instance.hours_until_departure(now)))
    }

    /// Release the hold of `booking_id`; returns the seats given back with the outcome
    pub(crate) async fn release_seats(
        &self,
        instance_id: Uuid,
        booking_id: Uuid,
    ) -> Result<(TourInstance, (i32, Recompute)), BookingError> {
        let lifecycle = &self.lifecycle;
        self.mutate_instance(instance_id, |instance, now| {
            let released = CapacityLedger::release(instance, booking_id)?;
            Ok((released, lifecycle.recompute(instance, now)))
        })
        .await
    }

    // ------------------------------------------------------------------
    // Optimistic update loops
    // ------------------------------------------------------------------

    pub(crate) async fn mutate_instance<T, F>(
        &self,
        instance_id: Uuid,
        mut change: F,
    ) -> Result<(TourInstance, T), BookingError>
    where
        T: Send,
        F: FnMut(&mut TourInstance, DateTime<Utc>) -> Result<T, BookingError> + Send,
    {
        let attempts = self.rules.max_conflict_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let doc = self
                .instances
                .get_instance(instance_id)
                .await?
                .ok_or_else(|| BookingError::NotFound(format!("instance {}", instance_id)))?;

            let mut instance = doc.value.clone();
            let output = change(&mut instance, self.clock.now())?;
            if instance == doc.value {
                return Ok((instance, output));
            }

            match self.instances.update_instance(&instance, doc.revision).await {
                Ok(_) => return Ok((instance, output)),
                Err(e) if e.is_conflict() => {
                    warn!(
                        "Revision conflict on instance {} (attempt {}/{})",
                        instance_id, attempt, attempts
                    );
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(BookingError::NotFound(format!("instance {}", instance_id)))
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BookingError::Contention { attempts })
    }

    pub(crate) async fn mutate_booking<T, F>(
        &self,
        booking_id: Uuid,
        mut change: F,
    ) -> Result<(Booking, T), BookingError>
    where
        T: Send,
        F: FnMut(&mut Booking, DateTime<Utc>) -> Result<T, BookingError> + Send,
    {
        let attempts = self.rules.max_conflict_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let doc = self
                .bookings
                .get_booking(booking_id)
                .await?
                .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))?;

            let mut booking = doc.value.clone();
            let output = change(&mut booking, self.clock.now())?;
            if booking == doc.value {
                return Ok((booking, output));
            }

            match self.bookings.update_booking(&booking, doc.revision).await {
                Ok(_) => return Ok((booking, output)),
                Err(e) if e.is_conflict() => {
                    warn!(
                        "Revision conflict on booking {} (attempt {}/{})",
                        booking_id, attempt, attempts
                    );
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(BookingError::NotFound(format!("booking {}", booking_id)))
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BookingError::Contention { attempts })
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub(crate) fn publish(&self, event: TourEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn publish_instance(&self, instance: &TourInstance, outcome: &Recompute) {
        self.publish(TourEvent::InstanceUpdated(instance.to_event()));

        if outcome.pricing_activated {
            if let Some(pricing) = &instance.dynamic_pricing {
                self.publish(TourEvent::PricingActivated(PricingActivatedEvent {
                    instance_id: instance.id,
                    discount_percentage: pricing.discount_percentage,
                    reason: pricing.reason.as_str().to_string(),
                    price_per_person: instance.price_per_person,
                    original_price: instance.original_price,
                    valid_until: pricing.valid_until.timestamp(),
                    timestamp: instance.updated_at.timestamp(),
                }));
            }
        }
    }
}
