//! Service layer for the NomNom service.
//!
//! # Components
//!
//! - `storage` - Packet object storage capabilities and the S3 adapter
//! - `packet_metadata` - Pairs packet files with live storage metadata
//! - `ballots` - Synthetic ballot generation for test data

pub mod ballots;
pub mod packet_metadata;
pub mod storage;

pub use ballots::{generate_ballot, submit_fake_ballots, BallotProbabilities, FakeBallotSummary};
pub use storage::{PacketStorage, S3PacketStorage, StorageError};
