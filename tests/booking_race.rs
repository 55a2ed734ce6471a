use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use time::{OffsetDateTime, Time};
use tower::ServiceExt;
use uuid::Uuid;

use padel_club_back::{
    config::AppConfig,
    dao::{
        club_store::memory::MemoryClubStore,
        models::{BookingStatus, CancelReason, Level, SlotKind, SlotStatus},
    },
    dto::{
        booking::{BookRequest, CancelBookingRequest, PaymentMethod},
        timeslot::{ProposeClassRequest, ProposeMatchRequest},
        user::{CreateUserRequest, TopUpRequest, UserSummary},
    },
    error::ServiceError,
    routes,
    services::{booking_service, slot_service, wallet_service},
    state::{AppState, SharedState},
};

async fn club(config: AppConfig) -> (SharedState, MemoryClubStore) {
    let state = AppState::new(config);
    let store = MemoryClubStore::new();
    state
        .install_store(Arc::new(store.clone()))
        .await
        .expect("memory store loads");
    (state, store)
}

fn tomorrow_at(hour: u8) -> OffsetDateTime {
    let date = OffsetDateTime::now_utc().date().next_day().unwrap();
    date.with_time(Time::from_hms(hour, 0, 0).unwrap()).assume_utc()
}

async fn player(state: &SharedState, name: &str, credits_cents: i64) -> UserSummary {
    let user = wallet_service::create_user(
        state,
        CreateUserRequest {
            name: name.into(),
            email: format!("{name}@club.test"),
            level: Level::Intermediate,
        },
    )
    .await
    .unwrap();
    if credits_cents == 0 {
        return user;
    }
    wallet_service::top_up(
        state,
        user.id,
        TopUpRequest {
            amount_cents: credits_cents,
        },
    )
    .await
    .unwrap()
}

fn book(user: &UserSummary, slot_id: Uuid, group_size: Option<u8>) -> BookRequest {
    BookRequest {
        user_id: user.id,
        slot_id,
        group_size,
        payment: PaymentMethod::Credits,
    }
}

async fn class_tomorrow(state: &SharedState, hour: u8) -> Uuid {
    let instructor_id = state.config().instructors[0].id;
    slot_service::propose_class(
        state,
        ProposeClassRequest {
            instructor_id,
            starts_at: tomorrow_at(hour),
            duration_minutes: 60,
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn first_full_group_wins_the_race() {
    let (state, _store) = club(AppConfig::default()).await;
    let slot_id = class_tomorrow(&state, 10).await;
    let ana = player(&state, "ana", 5_000).await;
    let ben = player(&state, "ben", 5_000).await;
    let cleo = player(&state, "cleo", 5_000).await;

    let pending = booking_service::book(&state, book(&cleo, slot_id, Some(3)), SlotKind::Class)
        .await
        .unwrap();
    assert_eq!(pending.booking.status, BookingStatus::Pending);

    booking_service::book(&state, book(&ana, slot_id, Some(2)), SlotKind::Class)
        .await
        .unwrap();
    let outcome = booking_service::book(&state, book(&ben, slot_id, Some(2)), SlotKind::Class)
        .await
        .unwrap();

    assert_eq!(outcome.booking.status, BookingStatus::Confirmed);
    assert_eq!(outcome.slot.status, SlotStatus::Confirmed);
    assert_eq!(outcome.slot.court_id, Some(state.config().courts[0].id));
    assert_eq!(outcome.slot.confirmed_group_size, Some(2));

    let ana = wallet_service::get_user(&state, ana.id).await.unwrap();
    assert_eq!((ana.credits_cents, ana.blocked_cents), (3_000, 0));

    let cleo_bookings = booking_service::user_bookings(&state, cleo.id).await.unwrap();
    assert_eq!(cleo_bookings[0].cancel_reason, Some(CancelReason::Displaced));
    let cleo = wallet_service::get_user(&state, cleo.id).await.unwrap();
    assert_eq!((cleo.credits_cents, cleo.blocked_cents), (5_000, 0));
}

#[tokio::test]
async fn a_race_without_a_free_court_changes_nothing() {
    let mut config = AppConfig::default();
    config.courts.truncate(1);
    let (state, _store) = club(config).await;

    let match_id = slot_service::propose_match(
        &state,
        ProposeMatchRequest {
            starts_at: tomorrow_at(10),
            duration_minutes: 90,
        },
    )
    .await
    .unwrap()
    .id;
    for name in ["p1", "p2", "p3", "p4"] {
        let user = player(&state, name, 1_000).await;
        booking_service::book(&state, book(&user, match_id, None), SlotKind::Match)
            .await
            .unwrap();
    }
    let confirmed = slot_service::get_slot(&state, match_id).await.unwrap();
    assert_eq!(confirmed.status, SlotStatus::Confirmed);

    let class_id = class_tomorrow(&state, 11).await;
    let solo = player(&state, "solo", 5_000).await;
    let err = booking_service::book(&state, book(&solo, class_id, Some(1)), SlotKind::Class)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let solo = wallet_service::get_user(&state, solo.id).await.unwrap();
    assert_eq!((solo.credits_cents, solo.blocked_cents), (5_000, 0));
    assert!(booking_service::user_bookings(&state, solo.id).await.unwrap().is_empty());
    let class = slot_service::get_slot(&state, class_id).await.unwrap();
    assert_eq!(class.status, SlotStatus::Proposed);
    assert_eq!(class.level, None);
}

#[tokio::test]
async fn a_freed_spot_is_recycled_for_points() {
    let (state, _store) = club(AppConfig::default()).await;
    let slot_id = class_tomorrow(&state, 12).await;
    let ana = player(&state, "ana", 5_000).await;
    let ben = player(&state, "ben", 5_000).await;

    let first = booking_service::book(&state, book(&ana, slot_id, Some(2)), SlotKind::Class)
        .await
        .unwrap();
    booking_service::book(&state, book(&ben, slot_id, Some(2)), SlotKind::Class)
        .await
        .unwrap();

    let err = booking_service::cancel_booking(
        &state,
        first.booking.id,
        CancelBookingRequest { user_id: ben.id },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let cancelled = booking_service::cancel_booking(
        &state,
        first.booking.id,
        CancelBookingRequest { user_id: ana.id },
    )
    .await
    .unwrap();
    assert_eq!(cancelled.slot.recycled_spots, 1);
    assert_eq!(cancelled.slot.recycled_spot_points, Some(20));

    let ana_wallet = wallet_service::get_user(&state, ana.id).await.unwrap();
    assert_eq!((ana_wallet.credits_cents, ana_wallet.points), (3_000, 20));

    let rebooked = booking_service::book(
        &state,
        BookRequest {
            payment: PaymentMethod::Points,
            ..book(&ana, slot_id, None)
        },
        SlotKind::Class,
    )
    .await
    .unwrap();
    assert!(rebooked.booking.recycled);
    assert_eq!(rebooked.booking.status, BookingStatus::Confirmed);
    assert_eq!(rebooked.slot.recycled_spots, 0);
    let ana_wallet = wallet_service::get_user(&state, ana.id).await.unwrap();
    assert_eq!(ana_wallet.points, 0);

    let history = booking_service::user_bookings(&state, ana.id).await.unwrap();
    let ids: Vec<Uuid> = history.iter().map(|booking| booking.id).collect();
    assert_eq!(ids, vec![rebooked.booking.id, first.booking.id]);
}

#[tokio::test]
async fn nothing_is_applied_when_the_store_rejects_the_commit() {
    let (state, store) = club(AppConfig::default()).await;
    let ana = player(&state, "ana", 1_000).await;
    let persisted = store.transaction_count();

    store.set_offline(true);
    let err = wallet_service::top_up(&state, ana.id, TopUpRequest { amount_cents: 500 })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    let ana = wallet_service::get_user(&state, ana.id).await.unwrap();
    assert_eq!(ana.credits_cents, 1_000);
    assert_eq!(
        wallet_service::list_transactions(&state, ana.id)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(store.transaction_count(), persisted);
}

#[tokio::test]
async fn a_booking_cut_off_mid_write_survives_a_restart() {
    let (state, store) = club(AppConfig::default()).await;
    let slot_id = class_tomorrow(&state, 10).await;
    let ana = player(&state, "ana", 5_000).await;
    let ben = player(&state, "ben", 5_000).await;

    // Only the first row of the booking commit reaches the store.
    store.interrupt_next_write_after(1);
    booking_service::book(&state, book(&ana, slot_id, Some(2)), SlotKind::Class)
        .await
        .unwrap();

    let restarted = AppState::new(state.config().clone());
    restarted
        .install_store(Arc::new(store.clone()))
        .await
        .expect("journaled rows replay on load");
    let ana_wallet = wallet_service::get_user(&restarted, ana.id).await.unwrap();
    assert_eq!(ana_wallet.blocked_cents, 2_000);

    let outcome = booking_service::book(&restarted, book(&ben, slot_id, Some(2)), SlotKind::Class)
        .await
        .unwrap();
    assert_eq!(outcome.slot.status, SlotStatus::Confirmed);
    let ana_wallet = wallet_service::get_user(&restarted, ana.id).await.unwrap();
    assert_eq!((ana_wallet.credits_cents, ana_wallet.blocked_cents), (3_000, 0));
}

#[tokio::test]
async fn http_surface_validates_and_maps_errors() {
    let (state, _store) = club(AppConfig::default()).await;
    let app = routes::router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::post("/users")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "name": "Ana", "email": "not-an-email", "level": "beginner" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(
            Request::post("/users")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "name": "Ana", "email": "ana@club.test", "level": "beginner" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let user: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(user["available_cents"], 0);

    let response = app
        .clone()
        .oneshot(
            Request::post("/users")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "name": "Ana", "email": "ana@club.test", "level": "advanced" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(
            Request::get(format!("/users/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert!(error["message"].as_str().unwrap().contains("not found"));
}
