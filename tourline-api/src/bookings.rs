use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use tourline_booking::{Booking, BookingReceipt, CancelledBy, Customer};
use crate::{
    error::AppError,
    middleware::auth::{customer_auth_middleware, CustomerClaims},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub number_of_people: i32,
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/instances/{id}/bookings", post(create_booking))
        .route("/v1/bookings", get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route_layer(middleware::from_fn_with_state(state, customer_auth_middleware))
}

/// Customers only see their own bookings; anything else is reported as missing
async fn owned_booking(state: &AppState, claims: &CustomerClaims, id: Uuid) -> Result<Booking, AppError> {
    let booking = state.workflow.get_booking(id).await?;
    if booking.customer_id != claims.sub {
        return Err(AppError::NotFoundError(format!("booking {}", id)));
    }
    Ok(booking)
}

/// POST /v1/instances/{id}/bookings
async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(instance_id): Path<Uuid>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), AppError> {
    let customer = Customer::new(claims.sub, claims.email);
    let receipt = state
        .workflow
        .create_booking(instance_id, req.number_of_people, customer)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /v1/bookings
async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.workflow.list_customer_bookings(&claims.sub).await?))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(owned_booking(&state, &claims, id).await?))
}

/// POST /v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    owned_booking(&state, &claims, id).await?;

    let booking = state
        .workflow
        .cancel_booking(id, CancelledBy::Customer, req.reason)
        .await?;

    Ok(Json(booking))
}
