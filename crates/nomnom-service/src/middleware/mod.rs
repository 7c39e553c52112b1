//! Middleware for the NomNom service.
//!
//! # Components
//!
//! - `auth` - Session middleware and the login redirect
//! - `access` - Election access guard
//! - `http_metrics` - HTTP request metrics middleware

pub mod access;
pub mod auth;
pub mod http_metrics;

pub use access::{
    member_can_nominate, member_can_vote, require_election_access, AccessDecision,
    AccessPredicate, ElectionGuard, Subject,
};
pub use auth::{attach_member, require_member, AuthState, ClaimsExt};
pub use http_metrics::http_metrics_middleware;
