//! DeepChain Node
//!
//! A devnet node hosting one side of the DeepChain bridge behind a JSON API.

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use handlers::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))

        // Bridge and chain state
        .route("/api/v1/assets", get(handlers::list_assets))
        .route("/api/v1/events", get(handlers::list_events))
        .route("/api/v1/accounts/:address", get(handlers::get_account))
        .route("/api/v1/transactions", post(handlers::submit_transaction))

        // Models and reputation
        .route("/api/v1/models/:hash", get(handlers::get_model))
        .route("/api/v1/reputation/:address", get(handlers::get_reputation))

        // Inference
        .route("/api/v1/inference", post(handlers::run_inference))
        .route("/api/v1/inference/models", post(handlers::store_model))

        // State
        .with_state(state)

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
