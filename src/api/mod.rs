//! HTTP API module for Pixels
//!
//! Provides REST endpoints for:
//! - Reading the raw canvas
//! - Health checks

pub mod health;
pub mod pixels;

use axum::Router;

pub use health::health_routes;
pub use pixels::pixels_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new().merge(pixels_routes()).merge(health_routes())
}
