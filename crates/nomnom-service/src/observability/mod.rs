//! Observability for the NomNom service.
//!
//! Provides log filtering, metrics definitions and recording helpers.

pub mod logging;
pub mod metrics;
