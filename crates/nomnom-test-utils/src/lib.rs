//! # NomNom Test Utilities
//!
//! This crate provides:
//! - Server test harness (`TestNomnomServer` for E2E tests)
//! - Database fixtures for elections, members and packets
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nomnom_test_utils::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_example(pool: PgPool) -> Result<()> {
//!     let server = TestNomnomServer::spawn(pool).await?;
//!
//!     let response = reqwest::get(format!("{}/health", server.url())).await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

pub use fixtures::*;
pub use server_harness::*;
