//! Backend of the school portal.
//!
//! # General Infrastructure
//! - Single axum service behind the reverse proxy, JSON in and out
//! - State composes the student store, Redis, Meilisearch and the remote
//!   payment/billing gateways; everything optional degrades instead of
//!   failing startup
//! - The roster projection is kept hot by a live store subscription and
//!   served from memory, never recomputed per request
//! - Search goes through the backend proxy so the Meilisearch admin key
//!   stays server-side
//!
//! # Notes
//!
//! ## Identity headers
//! Requests carry `x-identity-uid` / `x-identity-email`. Admin routes gate
//! on the derived role, which is client-derived and weak; see the root docs
//! crate.
//!
//! # Setup
//!
//! ```sh
//! RUST_LOG=info cargo run -p server
//! ```
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::{delete, get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod search;
pub mod state;
pub mod utils;

use routes::{
    accounts_handler, card_handler, create_student_handler, delete_student_handler,
    payment_status_handler, pix_handler, recalculate_handler, roster_handler, search_handler,
    switch_handler, upsert_profile_handler,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(utils::IDENTITY_UID_HEADER),
            HeaderName::from_static(utils::IDENTITY_EMAIL_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/roster", get(roster_handler))
        .route("/search", get(search_handler))
        .route("/accounts", get(accounts_handler))
        .route("/accounts/switch", post(switch_handler))
        .route("/students", post(create_student_handler))
        .route("/students/{key}/profile", put(upsert_profile_handler))
        .route("/students/{key}", delete(delete_student_handler))
        .route("/payments/pix", post(pix_handler))
        .route("/payments/card", post(card_handler))
        .route("/payments/status", get(payment_status_handler))
        .route("/billing/recalculate", post(recalculate_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
