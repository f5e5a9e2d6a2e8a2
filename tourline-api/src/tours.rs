use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use tourline_catalog::{CancellationPolicy, GroupSize, ScheduleRequest, Tour, TourInstance};
use crate::{
    error::AppError,
    middleware::auth::{provider_auth_middleware, ProviderClaims},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateTourRequest {
    pub title: String,
    pub description: Option<String>,
    pub base_price: i64,
    pub currency: String,
    pub group_size: GroupSize,
    /// Falls back to the standard policy
    pub cancellation_policy: Option<CancellationPolicy>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let provider = Router::new()
        .route("/v1/tours", get(list_own_tours).post(create_tour))
        .route("/v1/tours/{id}/instances", post(schedule_instance))
        .route_layer(middleware::from_fn_with_state(state, provider_auth_middleware));

    Router::new()
        .route("/v1/tours/{id}", get(get_tour))
        .route("/v1/tours/{id}/instances", get(list_instances))
        .merge(provider)
}

/// POST /v1/tours
async fn create_tour(
    State(state): State<AppState>,
    Extension(claims): Extension<ProviderClaims>,
    Json(req): Json<CreateTourRequest>,
) -> Result<(StatusCode, Json<Tour>), AppError> {
    let mut tour = Tour::new(
        claims.provider_id.clone(),
        req.title,
        req.base_price,
        req.currency,
        req.group_size,
        req.cancellation_policy.unwrap_or_else(CancellationPolicy::standard),
    );
    tour.description = req.description;

    let tour = state.workflow.register_tour(tour).await?;
    Ok((StatusCode::CREATED, Json(tour)))
}

/// GET /v1/tours: the calling provider's templates
async fn list_own_tours(
    State(state): State<AppState>,
    Extension(claims): Extension<ProviderClaims>,
) -> Result<Json<Vec<Tour>>, AppError> {
    Ok(Json(state.workflow.list_provider_tours(&claims.provider_id).await?))
}

/// GET /v1/tours/{id}
async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tour>, AppError> {
    Ok(Json(state.workflow.get_tour(id).await?))
}

/// GET /v1/tours/{id}/instances
async fn list_instances(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TourInstance>>, AppError> {
    Ok(Json(state.workflow.list_tour_instances(id).await?))
}

/// POST /v1/tours/{id}/instances
async fn schedule_instance(
    State(state): State<AppState>,
    Extension(claims): Extension<ProviderClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<TourInstance>), AppError> {
    let tour = state.workflow.get_tour(id).await?;
    if !claims.can_manage(&tour.provider_id) {
        return Err(AppError::AuthorizationError(format!("tour {} belongs to another provider", id)));
    }

    let instance = state.workflow.schedule_instance(id, req).await?;
    Ok((StatusCode::CREATED, Json(instance)))
}
