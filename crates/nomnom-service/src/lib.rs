//! NomNom convention voting service.
//!
//! Serves the election list, the nomination form, the final ballot, and the
//! Hugo voter packet. Login happens elsewhere; this service trusts the
//! session token it is handed.
//!
//! Architecture: `routes -> middleware -> handlers -> services -> repositories`.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
