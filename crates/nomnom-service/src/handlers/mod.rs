//! HTTP request handlers for the NomNom service.

pub mod elections;
pub mod health;
pub mod metrics;
pub mod packets;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

pub use elections::{closed_election, election_mode_redirect, list_elections, nominate, vote};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use packets::{download_packet_file, packet_index};

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
