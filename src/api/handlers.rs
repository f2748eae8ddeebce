use std::sync::Arc;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use log::info;
use serde::Deserialize;

use crate::broker::RateBroker;
use crate::feed::RatePoint;

#[derive(Clone)]
pub struct ApiState {
    pub broker: Arc<RateBroker>,
}

#[derive(Debug, Deserialize)]
pub struct CurrencyQuery {
    pub currency: Option<String>,
}

// GET /currency?currency=USD - Point query against the published snapshot
pub async fn get_currency(
    State(state): State<ApiState>,
    Query(query): Query<CurrencyQuery>,
) -> Result<Json<RatePoint>, (StatusCode, Json<serde_json::Value>)> {
    let code = query.currency.unwrap_or_default();

    match state.broker.rate_for(&code) {
        Some(point) => {
            info!("Currency query for {} answered", code);
            Ok(Json(point))
        }
        None => Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid currency code or data not available."
            })),
        )),
    }
}

// GET /health - Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "rate_socket",
        "subscribers": state.broker.subscriber_count(),
        "timestamp": chrono::Utc::now()
    }))
}

// Create the API router
pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/currency", get(get_currency))
        .route("/health", get(health_check))
        .with_state(state)
}
