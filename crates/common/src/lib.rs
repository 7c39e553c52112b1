//! Common utilities and types shared across NomNom components.

#![warn(clippy::pedantic)]

/// Module for common data types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for session token utilities (claims, size limits, iat validation)
pub mod jwt;
