use axum::{
    routing::{get, post},
    Router,
    extract::State,
    response::IntoResponse,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::models::{CheckRequest, CheckResponse};
use crate::api::response;
use crate::error::Result;
use crate::AppState;

pub const HEALTH_MESSAGE: &str = "Phishing detection API is running. POST a URL to /api/check-url";

pub fn create_router(app_state: AppState) -> Router {
    let static_files = ServeDir::new(&app_state.config.static_dir);

    Router::new()
        .route("/", get(health_handler))
        .route("/api/check-url", post(check_url_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn health_handler() -> &'static str {
    HEALTH_MESSAGE
}

async fn check_url_handler(
    State(state): State<AppState>,
    req: CheckRequest,
) -> Result<impl IntoResponse> {
    info!(url = %req.url, "checking URL");
    let output = state.classifier.classify(&req.url).await?;
    let body = CheckResponse::from(output);
    info!(url = %req.url, prediction = %body.prediction, probability = body.probability, "classified URL");
    Ok(response::success(body))
}
