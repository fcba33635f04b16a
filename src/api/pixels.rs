//! Canvas snapshot endpoint

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::warn;

use crate::server::state::AppState;

/// Raw canvas bytes, one digit per cell
async fn get_pixels(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.store.get().await {
        Ok(canvas) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            canvas,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "error getting pixels data from store");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "could not retrieve pixels data",
            )
                .into_response()
        }
    }
}

/// Create canvas routes
pub fn pixels_routes() -> Router {
    Router::new().route("/pixels", get(get_pixels))
}
