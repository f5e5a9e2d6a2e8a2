use std::sync::Arc;
use axum::{
    routing::get,
    Router,
    http::{Method, StatusCode},
    extract::State,
    Json,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tourline_booking::{BookingRepository, BookingWorkflow, InstanceRepository, TourCatalog};
use tourline_core::{Clock, PaymentAdapter};
use tourline_store::Config;

pub mod auth;
pub mod bookings;
pub mod error;
pub mod instances;
pub mod middleware;
pub mod state;
pub mod tours;
pub mod webhooks;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(tours::routes(state.clone()))
        .merge(instances::routes(state.clone()))
        .merge(bookings::routes(state.clone()))
        .merge(webhooks::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let Some(db) = &state.db else {
        return (StatusCode::OK, Json(json!({ "status": "ok", "storage": "memory" })));
    };

    match db.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok", "storage": "postgres" }))),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "storage": "postgres" })),
            )
        }
    }
}

/// Wire one store implementing every repository into a workflow tuned by `config`
pub fn build_workflow<S>(
    store: Arc<S>,
    payments: Arc<dyn PaymentAdapter>,
    clock: Arc<dyn Clock>,
    config: &Config,
) -> BookingWorkflow
where
    S: TourCatalog + InstanceRepository + BookingRepository + 'static,
{
    BookingWorkflow::new(store.clone(), store.clone(), store, payments, clock)
        .with_lifecycle(config.lifecycle())
        .with_rules(config.booking_rules.clone())
}
