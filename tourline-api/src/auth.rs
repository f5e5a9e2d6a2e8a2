use axum::{
    extract::State,
    Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use jsonwebtoken::{encode, Header, EncodingKey};
use chrono::{Utc, Duration};
use crate::{
    state::AppState,
    error::AppError,
    middleware::auth::{CustomerClaims, ProviderClaims, ROLE_CUSTOMER, ROLE_PROVIDER},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TokenRole {
    Customer,
    Provider,
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    role: TokenRole,
    subject: String,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    expires_in: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/token", post(issue_token))
}

/// Development token issuer. Providers get their subject as provider id.
async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if req.subject.trim().is_empty() {
        return Err(AppError::ValidationError("subject must not be empty".to_string()));
    }

    let exp = (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize;
    let key = EncodingKey::from_secret(state.auth.secret.as_bytes());

    let token = match req.role {
        TokenRole::Customer => encode(
            &Header::default(),
            &CustomerClaims {
                sub: req.subject,
                email: req.email,
                role: ROLE_CUSTOMER.to_owned(),
                exp,
            },
            &key,
        ),
        TokenRole::Provider => encode(
            &Header::default(),
            &ProviderClaims {
                sub: req.subject.clone(),
                role: ROLE_PROVIDER.to_owned(),
                provider_id: req.subject,
                exp,
            },
            &key,
        ),
    }
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    Ok(Json(AuthResponse {
        token,
        expires_in: state.auth.expiration,
    }))
}
