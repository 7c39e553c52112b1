//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across NomNom for the session
//! signing key, the database URL and anything else that must never end up
//! in a log line.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` that holds one is safe to pass to `tracing`. The inner value is
//! only reachable through [`ExposeSecret::expose_secret`].
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SessionKey {
//!     issuer: String,
//!     key: SecretString,
//! }
//!
//! let session = SessionKey {
//!     issuer: "nomnom".to_string(),
//!     key: SecretString::from("signing-key"),
//! };
//!
//! // The key is redacted here
//! println!("{:?}", session);
//!
//! let raw: &str = session.key.expose_secret();
//! assert_eq!(raw, "signing-key");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
