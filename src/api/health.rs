//! Health check endpoints.
//!
//! Provides:
//! - `/health`: status, version and live client count (for load balancers)
//! - `/health/detailed`: hub bookkeeping and store reachability

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::server::state::AppState;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<usize>,
}

/// Detailed health response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub hub: ComponentHealth,
    pub store: ComponentHealth,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    fn healthy_with_details(latency_ms: u64, details: serde_json::Value) -> Self {
        Self {
            status: "healthy",
            latency_ms: Some(latency_ms),
            error: None,
            details: Some(details),
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            latency_ms: None,
            error: Some(error),
            details: None,
        }
    }
}

/// Simple health check (for load balancers)
async fn health_check(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.hub.count().await {
        Ok(clients) => Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            clients: Some(clients),
        })
        .into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
                version: env!("CARGO_PKG_VERSION"),
                clients: None,
            }),
        )
            .into_response(),
    }
}

/// Detailed health check with hub and store status
async fn detailed_health_check(Extension(state): Extension<Arc<AppState>>) -> Response {
    let start = std::time::Instant::now();
    let hub = match state.hub.stats().await {
        Ok(stats) => ComponentHealth::healthy_with_details(
            start.elapsed().as_millis() as u64,
            serde_json::json!({
                "connections": stats.connections,
                "addresses": stats.addresses,
                "tracked_addresses": stats.tracked_addresses,
            }),
        ),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    };

    let start = std::time::Instant::now();
    let store = match state.store.get().await {
        Ok(canvas) => ComponentHealth::healthy_with_details(
            start.elapsed().as_millis() as u64,
            serde_json::json!({
                "backend": state.store.backend(),
                "cells": canvas.len(),
            }),
        ),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    };

    let (code, status) = match (hub.status, store.status) {
        ("healthy", "healthy") => (StatusCode::OK, "healthy"),
        ("healthy", _) => (StatusCode::OK, "degraded"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        code,
        Json(DetailedHealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            hub,
            store,
        }),
    )
        .into_response()
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
}
