//! Repository layer for the NomNom service.
//!
//! Provides database access following the Handler -> Service -> Repository
//! architecture. All queries use parameterized statements.

pub mod elections;
pub mod members;
pub mod packets;
pub mod ranks;

pub use elections::ElectionsRepository;
pub use members::MembersRepository;
pub use packets::PacketsRepository;
pub use ranks::RanksRepository;
