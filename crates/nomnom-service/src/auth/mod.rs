//! Member session authentication.
//!
//! The OAuth login pipeline resolves a person to a member profile and hands
//! off by issuing a session token; everything after that point is here.

pub mod session;

pub use session::{SessionError, SessionSigner, SessionValidator, SESSION_COOKIE};
