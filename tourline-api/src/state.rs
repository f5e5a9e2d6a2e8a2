use std::sync::Arc;
use tourline_booking::BookingWorkflow;
use tourline_store::DbClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<BookingWorkflow>,
    /// Present only with the postgres backend
    pub db: Option<Arc<DbClient>>,
    pub auth: AuthConfig,
}
