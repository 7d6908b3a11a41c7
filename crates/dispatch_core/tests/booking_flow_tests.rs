mod support;

use dispatch_core::domain::{
    Actor, Availability, PaymentStatus, RideEventType, RideStatus,
};
use dispatch_core::error::DispatchError;
use dispatch_core::ops::{
    CancelRequest, FinalizeRequest, UpdateStatusRequest, VerifyOtpRequest,
};
use dispatch_core::store::DispatchStore;
use dispatch_core::test_helpers::test_context;
use support::matched_booking;

fn progress(
    ctx: &dispatch_core::test_helpers::TestContext,
    booking_id: uuid::Uuid,
    status: RideStatus,
    actor: Actor,
) {
    ctx.dispatch
        .update_status(
            Some(actor),
            UpdateStatusRequest {
                booking_id,
                new_status: status,
                reason: None,
                location: None,
                metadata: None,
            },
        )
        .unwrap_or_else(|e| panic!("transition to {status} failed: {e}"));
}

#[test]
fn full_trip_from_booking_to_settlement() {
    let ctx = test_context();
    let (booking_id, rider_id, driver_id, otp) = matched_booking(&ctx);
    let rider = Actor::Rider(rider_id);
    let driver = Actor::Driver(driver_id);

    progress(&ctx, booking_id, RideStatus::DriverEnRoute, driver);
    progress(&ctx, booking_id, RideStatus::DriverArrived, driver);

    // Wrong code first: rejected, logged, nothing moves.
    let bad = ctx.dispatch.verify_otp(
        Some(driver),
        VerifyOtpRequest {
            booking_id,
            otp: "0000".to_string(),
            location: None,
        },
    );
    assert!(matches!(bad, Err(DispatchError::PreconditionFailed(_))));
    let ride = ctx.store.ride(booking_id).expect("get").expect("ride");
    assert_eq!(ride.status, RideStatus::DriverArrived);
    let failed_checks = ctx
        .store
        .events_where(&|e| {
            e.ride_id == booking_id
                && e.event_type == RideEventType::OtpVerified
                && e.payload["verified"] == false
        })
        .expect("events");
    assert_eq!(failed_checks.len(), 1);

    // Right code starts the trip and puts the driver on it.
    let verified = ctx
        .dispatch
        .verify_otp(
            Some(driver),
            VerifyOtpRequest {
                booking_id,
                otp,
                location: None,
            },
        )
        .expect("verify");
    assert_eq!(verified.new_status, RideStatus::TripStarted);
    let profile = ctx.store.driver(driver_id).expect("get").expect("driver");
    assert_eq!(profile.availability, Availability::OnTrip);

    progress(&ctx, booking_id, RideStatus::TripInProgress, driver);
    progress(&ctx, booking_id, RideStatus::TripCompleted, driver);

    // Settle with actuals: 6 km / 20 min mini = 50 + 84 + 40 = 174, tip 10.
    let finalized = ctx
        .dispatch
        .finalize_fare(
            Some(driver),
            FinalizeRequest {
                booking_id,
                actual_distance_km: Some(6.0),
                actual_duration_minutes: Some(20),
                tip_amount: Some(10),
                location: None,
            },
        )
        .expect("finalize");
    assert_eq!(finalized.final_fare, 174);
    assert_eq!(finalized.tip_amount, 10);
    assert_eq!(finalized.total_amount, 184);
    assert_eq!(finalized.status, RideStatus::TripCompleted);

    let ride = ctx.store.ride(booking_id).expect("get").expect("ride");
    assert_eq!(ride.final_fare, Some(174));
    assert_eq!(ride.actual_distance_km, Some(6.0));
    assert!(ride.trip_completed_at.is_some());

    let payments = ctx
        .store
        .payments_where(&|p| p.ride_id == booking_id)
        .expect("payments");
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, 184);
    assert_eq!(payments[0].user_id, rider_id);
    assert_eq!(payments[0].status, PaymentStatus::Pending); // cash

    let profile = ctx.store.driver(driver_id).expect("get").expect("driver");
    assert_eq!(profile.availability, Availability::Online);

    // Rider settles the payment; booking reaches its terminal status.
    progress(&ctx, booking_id, RideStatus::PaymentCompleted, rider);
    let ride = ctx.store.ride(booking_id).expect("get").expect("ride");
    assert_eq!(ride.status, RideStatus::PaymentCompleted);

    // Audit trail covers the whole story.
    let mut events = ctx
        .store
        .events_where(&|e| e.ride_id == booking_id)
        .expect("events");
    events.sort_by_key(|e| e.recorded_at);
    let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert!(types.starts_with(&[
        RideEventType::BookingCreated,
        RideEventType::DriverSearchStarted,
        RideEventType::DriverPinged,
        RideEventType::DriverAssigned,
    ]));
    assert!(types.contains(&RideEventType::TripCompleted));
    assert!(types.contains(&RideEventType::PaymentCompleted));
}

#[test]
fn finalize_without_actuals_reuses_the_estimate_figures() {
    let ctx = test_context();
    let (booking_id, _, driver_id, otp) = matched_booking(&ctx);
    let driver = Actor::Driver(driver_id);

    progress(&ctx, booking_id, RideStatus::DriverEnRoute, driver);
    progress(&ctx, booking_id, RideStatus::DriverArrived, driver);
    ctx.dispatch
        .verify_otp(
            Some(driver),
            VerifyOtpRequest {
                booking_id,
                otp,
                location: None,
            },
        )
        .expect("verify");
    progress(&ctx, booking_id, RideStatus::TripInProgress, driver);

    // Finalizing straight from trip_in_progress is allowed and completes
    // the ride. 5 km / 15 min mini at surge 1.0 = 150.
    let finalized = ctx
        .dispatch
        .finalize_fare(
            Some(driver),
            FinalizeRequest {
                booking_id,
                actual_distance_km: None,
                actual_duration_minutes: None,
                tip_amount: None,
                location: None,
            },
        )
        .expect("finalize");
    assert_eq!(finalized.final_fare, 150);
    assert_eq!(finalized.total_amount, 150);

    let ride = ctx.store.ride(booking_id).expect("get").expect("ride");
    assert_eq!(ride.status, RideStatus::TripCompleted);
}

#[test]
fn cancel_en_route_charges_ten_percent() {
    let ctx = test_context();
    let (booking_id, rider_id, driver_id, _) = matched_booking(&ctx);
    let driver = Actor::Driver(driver_id);

    progress(&ctx, booking_id, RideStatus::DriverEnRoute, driver);

    let outcome = ctx
        .dispatch
        .cancel(
            Some(Actor::Rider(rider_id)),
            CancelRequest {
                booking_id,
                reason: Some("waited too long".to_string()),
                location: None,
            },
        )
        .expect("cancel");
    assert_eq!(outcome.old_status, RideStatus::DriverEnRoute);
    assert_eq!(outcome.new_status, RideStatus::CancelledByUser);
    assert_eq!(outcome.cancellation_fee, 15); // 10% of 150

    let ride = ctx.store.ride(booking_id).expect("get").expect("ride");
    assert_eq!(ride.status, RideStatus::CancelledByUser);
    assert_eq!(ride.final_fare, Some(15));
    assert_eq!(ride.cancellation_reason.as_deref(), Some("waited too long"));

    let payments = ctx
        .store
        .payments_where(&|p| p.ride_id == booking_id)
        .expect("payments");
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, 15);
    assert_eq!(payments[0].status, PaymentStatus::Pending);

    let profile = ctx.store.driver(driver_id).expect("get").expect("driver");
    assert_eq!(profile.availability, Availability::Online);
}

#[test]
fn free_cancellation_before_any_driver_movement() {
    let ctx = test_context();
    let (booking_id, rider_id, _, _) = matched_booking(&ctx);

    let outcome = ctx
        .dispatch
        .cancel(
            Some(Actor::Rider(rider_id)),
            CancelRequest {
                booking_id,
                reason: None,
                location: None,
            },
        )
        .expect("cancel");
    assert_eq!(outcome.cancellation_fee, 0);

    let ride = ctx.store.ride(booking_id).expect("get").expect("ride");
    assert_eq!(ride.final_fare, None);
    assert!(ctx
        .store
        .payments_where(&|p| p.ride_id == booking_id)
        .expect("payments")
        .is_empty());
}

#[test]
fn driver_cancellation_bumps_their_counter() {
    let ctx = test_context();
    let (booking_id, _, driver_id, _) = matched_booking(&ctx);

    ctx.dispatch
        .cancel(
            Some(Actor::Driver(driver_id)),
            CancelRequest {
                booking_id,
                reason: Some("vehicle breakdown".to_string()),
                location: None,
            },
        )
        .expect("cancel");

    let ride = ctx.store.ride(booking_id).expect("get").expect("ride");
    assert_eq!(ride.status, RideStatus::CancelledByDriver);

    let profile = ctx.store.driver(driver_id).expect("get").expect("driver");
    assert_eq!(profile.cancellation_count, 1);
    assert_eq!(profile.availability, Availability::Online);
}

#[test]
fn cancellation_is_refused_once_the_trip_is_underway() {
    let ctx = test_context();
    let (booking_id, rider_id, driver_id, otp) = matched_booking(&ctx);
    let driver = Actor::Driver(driver_id);

    progress(&ctx, booking_id, RideStatus::DriverEnRoute, driver);
    progress(&ctx, booking_id, RideStatus::DriverArrived, driver);
    ctx.dispatch
        .verify_otp(
            Some(driver),
            VerifyOtpRequest {
                booking_id,
                otp,
                location: None,
            },
        )
        .expect("verify");

    for actor in [Actor::Rider(rider_id), driver] {
        assert!(matches!(
            ctx.dispatch.cancel(
                Some(actor),
                CancelRequest {
                    booking_id,
                    reason: None,
                    location: None,
                },
            ),
            Err(DispatchError::PreconditionFailed(_))
        ));
    }
}

#[test]
fn verify_otp_is_for_the_assigned_driver_only() {
    let ctx = test_context();
    let (booking_id, rider_id, driver_id, otp) = matched_booking(&ctx);
    let driver = Actor::Driver(driver_id);

    progress(&ctx, booking_id, RideStatus::DriverEnRoute, driver);
    progress(&ctx, booking_id, RideStatus::DriverArrived, driver);

    for wrong_actor in [
        Actor::Rider(rider_id),
        Actor::Driver(uuid::Uuid::new_v4()),
        Actor::System,
    ] {
        assert!(matches!(
            ctx.dispatch.verify_otp(
                Some(wrong_actor),
                VerifyOtpRequest {
                    booking_id,
                    otp: otp.clone(),
                    location: None,
                },
            ),
            Err(DispatchError::Unauthorized(_))
        ));
    }
}
