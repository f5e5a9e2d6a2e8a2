use std::convert::Infallible;
use axum::{
    extract::{Path, State},
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use uuid::Uuid;
use tourline_booking::Booking;
use tourline_catalog::TourInstance;
use crate::{
    error::AppError,
    middleware::auth::{provider_auth_middleware, ProviderClaims},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CancelInstanceRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct CancelInstanceResponse {
    pub instance: TourInstance,
    pub cancelled_bookings: Vec<Booking>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let provider = Router::new()
        .route("/v1/instances/{id}/recompute", post(recompute_instance))
        .route("/v1/instances/{id}/cancel", post(cancel_instance))
        .route_layer(middleware::from_fn_with_state(state, provider_auth_middleware));

    Router::new()
        .route("/v1/instances/{id}", get(get_instance))
        .route("/v1/instances/{id}/stream", get(stream_instance))
        .merge(provider)
}

async fn owned_instance(
    state: &AppState,
    claims: &ProviderClaims,
    id: Uuid,
) -> Result<TourInstance, AppError> {
    let instance = state.workflow.get_instance(id).await?;
    if !claims.can_manage(&instance.provider_id) {
        return Err(AppError::AuthorizationError(format!("instance {} belongs to another provider", id)));
    }
    Ok(instance)
}

/// GET /v1/instances/{id}
async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TourInstance>, AppError> {
    Ok(Json(state.workflow.get_instance(id).await?))
}

/// POST /v1/instances/{id}/recompute
async fn recompute_instance(
    State(state): State<AppState>,
    Extension(claims): Extension<ProviderClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<TourInstance>, AppError> {
    owned_instance(&state, &claims, id).await?;
    Ok(Json(state.workflow.recompute_instance(id).await?))
}

/// POST /v1/instances/{id}/cancel
async fn cancel_instance(
    State(state): State<AppState>,
    Extension(claims): Extension<ProviderClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelInstanceRequest>,
) -> Result<Json<CancelInstanceResponse>, AppError> {
    owned_instance(&state, &claims, id).await?;

    let (instance, cancelled_bookings) = state.workflow.cancel_instance(id, req.reason).await?;
    tracing::info!(
        "Provider {} cancelled instance {} ({} bookings refunded)",
        claims.provider_id,
        id,
        cancelled_bookings.len()
    );

    Ok(Json(CancelInstanceResponse {
        instance,
        cancelled_bookings,
    }))
}

/// GET /v1/instances/{id}/stream
/// Live availability and pricing events for one departure
async fn stream_instance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Unknown instances get a 404 rather than an empty stream
    state.workflow.get_instance(id).await?;

    let rx = state.workflow.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.instance_id() == id => Event::default()
            .event(event.name())
            .json_data(&event)
            .ok()
            .map(Ok),
        // Lagged receivers skip what they missed
        _ => None,
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
