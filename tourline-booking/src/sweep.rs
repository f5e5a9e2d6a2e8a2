use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use tracing::{debug, error, info, warn};
use tourline_catalog::TourInstance;
use tourline_shared::TourEvent;
use crate::error::BookingError;
use crate::models::{BookingStatus, CancelledBy};
use crate::workflow::BookingWorkflow;

/// What one pass of the background sweep did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub completed: usize,
    pub expired_holds: usize,
    pub recomputed: usize,
    /// Interrupted cancellations whose seats were given back
    pub settled: usize,
    pub failures: usize,
}

impl SweepReport {
    pub fn is_idle(&self) -> bool {
        self.completed == 0
            && self.expired_holds == 0
            && self.recomputed == 0
            && self.settled == 0
            && self.failures == 0
    }
}

impl BookingWorkflow {
    /// Time-driven maintenance of every open departure:
    /// completes departed instances, expires unpaid holds and re-derives
    /// status so risk and rescue pricing kick in without a booking event.
    /// Cancellations that stopped half way are finished as well.
    ///
    /// One failing instance does not stop the pass.
    pub async fn sweep(&self) -> Result<SweepReport, BookingError> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for instance in self.instances.list_open_instances().await? {
            let result = if self.lifecycle.is_due_for_completion(&instance, now) {
                match self.complete_instance(instance.id).await {
                    Ok(_) => {
                        report.completed += 1;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            } else {
                self.refresh_instance(&instance, now, &mut report).await
            };

            if let Err(e) = result {
                report.failures += 1;
                error!("Sweep failed for instance {}: {}", instance.id, e);
            }
        }

        for instance in self.instances.list_cancelled_holding_seats().await? {
            let fallback = "unspecified".to_string();
            match self.cancel_instance(instance.id, fallback).await {
                Ok((_, bookings)) => report.settled += bookings.len(),
                Err(e) => {
                    report.failures += 1;
                    error!("Could not finish cancellation of instance {}: {}", instance.id, e);
                }
            }
        }

        if report.is_idle() {
            debug!("Sweep found nothing to do");
        } else {
            info!(
                "Sweep done: {} completed, {} holds expired, {} recomputed, {} settled, {} failures",
                report.completed, report.expired_holds, report.recomputed, report.settled, report.failures
            );
        }
        Ok(report)
    }

    /// Close a departed instance. Confirmed bookings complete with it; bookings
    /// still waiting for payment are dropped and their seats returned.
    ///
    /// Bookings are settled before the instance is marked completed, so a run that
    /// fails part way leaves the instance open and the next sweep picks it up again.
    pub async fn complete_instance(&self, instance_id: Uuid) -> Result<TourInstance, BookingError> {
        let mut preview = self.get_instance(instance_id).await?;
        self.lifecycle.complete(&mut preview, self.clock.now())?;

        self.settle_departed_bookings(instance_id).await?;

        let lifecycle = &self.lifecycle;
        self.mutate_instance(instance_id, |instance, now| {
            lifecycle.complete(instance, now)?;
            Ok(())
        })
        .await?;

        // Picks up a booking stored between the first pass and the status change
        self.settle_departed_bookings(instance_id).await?;

        let instance = self.get_instance(instance_id).await?;
        info!(
            "Instance {} completed with {} participants",
            instance.id, instance.booked_spots
        );
        self.publish(TourEvent::InstanceUpdated(instance.to_event()));
        Ok(instance)
    }

    async fn settle_departed_bookings(&self, instance_id: Uuid) -> Result<(), BookingError> {
        let instance = self.get_instance(instance_id).await?;

        for booking in self.bookings.list_bookings_by_instance(instance_id).await? {
            if booking.is_active() {
                // The listed status may be stale; decide on the stored one
                let (booking, dropped) = self
                    .mutate_booking(booking.id, |booking, now| match booking.status {
                        BookingStatus::Confirmed => booking.complete(now).map(|()| false),
                        BookingStatus::PendingPayment => booking
                            .cancel(
                                CancelledBy::System,
                                Some("payment_not_received".to_string()),
                                100,
                                now,
                            )
                            .map(|()| true),
                        _ => Ok(false),
                    })
                    .await?;

                if dropped {
                    self.finish_cancellation(booking).await?;
                }
            } else if booking.status == BookingStatus::Cancelled && instance.holds_seats_for(booking.id) {
                self.finish_cancellation(booking).await?;
            }
        }
        Ok(())
    }

    async fn refresh_instance(
        &self,
        instance: &TourInstance,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), BookingError> {
        let hold = self.rules.payment_hold();
        let current = self.get_instance(instance.id).await?;

        for booking in self.bookings.list_bookings_by_instance(instance.id).await? {
            if booking.status == BookingStatus::Cancelled && current.holds_seats_for(booking.id) {
                warn!("Booking {} was cancelled without releasing its seats", booking.id);
                self.finish_cancellation(booking).await?;
                report.settled += 1;
                continue;
            }

            if booking.status != BookingStatus::PendingPayment || booking.created_at + hold > now {
                continue;
            }

            warn!(
                "Booking {} unpaid since {}, releasing {} seats",
                booking.id, booking.created_at, booking.number_of_people
            );
            match self
                .cancel_booking_inner(
                    booking.id,
                    CancelledBy::System,
                    Some("payment_hold_expired".to_string()),
                    true,
                )
                .await
            {
                Ok(_) => report.expired_holds += 1,
                // Paid or cancelled in the meantime
                Err(BookingError::AlreadyCancelled(_))
                | Err(BookingError::InvalidStateTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let before = self.get_instance(instance.id).await?;
        let after = self.recompute_instance(instance.id).await?;
        if before != after {
            report.recomputed += 1;
        }
        Ok(())
    }
}
