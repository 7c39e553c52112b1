//! HTTP routes for the NomNom service.
//!
//! Defines the Axum router and application state.

use crate::auth::SessionValidator;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{
    attach_member, http_metrics_middleware, member_can_nominate, member_can_vote,
    require_election_access, require_member, AuthState, ElectionGuard,
};
use crate::services::storage::PacketStorage;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: PgPool,

    /// Service configuration.
    pub config: Config,

    /// Packet object storage (listing and download signing).
    pub storage: Arc<dyn PacketStorage>,
}

/// Build the application routes.
///
/// - `/health`, `/ready`, `/metrics` - operational, unversioned
/// - `/api/v1/elections` and `/api/v1/elections/:election_id[/closed]` - optional session
/// - `/api/v1/elections/:election_id/nominate` - login + `member_can_nominate`
/// - `/api/v1/elections/:election_id/{vote,packet,packet/files/:id}` - login + `member_can_vote`
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let validator = Arc::new(SessionValidator::new(
        &state.config.secret_key,
        state.config.jwt_clock_skew_seconds,
    ));
    let auth_state = Arc::new(AuthState {
        validator,
        login_url: state.config.login_url.clone(),
    });

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Optional session: pages that read differently for members
    let public_routes = Router::new()
        .route("/api/v1/elections", get(handlers::list_elections))
        .route(
            "/api/v1/elections/:election_id",
            get(handlers::election_mode_redirect),
        )
        .route(
            "/api/v1/elections/:election_id/closed",
            get(handlers::closed_election),
        )
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            attach_member,
        ))
        .with_state(state.clone());

    // route_layer order: the last one added runs first
    let nominate_guard = ElectionGuard::new(state.clone(), "member_can_nominate", member_can_nominate);
    let nominating_routes = Router::new()
        .route(
            "/api/v1/elections/:election_id/nominate",
            get(handlers::nominate),
        )
        .route_layer(middleware::from_fn_with_state(
            nominate_guard,
            require_election_access,
        ))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_member,
        ))
        .with_state(state.clone());

    let vote_guard = ElectionGuard::new(state.clone(), "member_can_vote", member_can_vote);
    let voting_routes = Router::new()
        .route("/api/v1/elections/:election_id/vote", get(handlers::vote))
        .route(
            "/api/v1/elections/:election_id/packet",
            get(handlers::packet_index),
        )
        .route(
            "/api/v1/elections/:election_id/packet/files/:packet_file_id",
            get(handlers::download_packet_file),
        )
        .route_layer(middleware::from_fn_with_state(
            vote_guard,
            require_election_access,
        ))
        .route_layer(middleware::from_fn_with_state(auth_state, require_member))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost, sees every response)
    health_routes
        .merge(metrics_routes)
        .merge(public_routes)
        .merge(nominating_routes)
        .merge(voting_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
