//! NomNom service models.
//!
//! Contains the voting domain rows, the election phase rules, and the
//! JSON response bodies served by the API.

use chrono::{DateTime, Utc};
use common::types::StorageKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Election
// ============================================================================

/// Election lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionState {
    /// Configured but nominations have not opened.
    PreNomination,

    /// Members with nominating rights may nominate.
    Nominating,

    /// Nominations ended; finalists are being prepared.
    NominationsClosed,

    /// Members with voting rights may rank finalists.
    Voting,

    /// The election is over.
    VotingClosed,
}

impl ElectionState {
    /// Returns the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElectionState::PreNomination => "pre_nomination",
            ElectionState::Nominating => "nominating",
            ElectionState::NominationsClosed => "nominations_closed",
            ElectionState::Voting => "voting",
            ElectionState::VotingClosed => "voting_closed",
        }
    }
}

impl fmt::Display for ElectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown election state string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown election state '{0}'")]
pub struct UnknownElectionState(pub String);

impl FromStr for ElectionState {
    type Err = UnknownElectionState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_nomination" => Ok(ElectionState::PreNomination),
            "nominating" => Ok(ElectionState::Nominating),
            "nominations_closed" => Ok(ElectionState::NominationsClosed),
            "voting" => Ok(ElectionState::Voting),
            "voting_closed" => Ok(ElectionState::VotingClosed),
            other => Err(UnknownElectionState(other.to_string())),
        }
    }
}

/// Election row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Election {
    /// Database id.
    pub id: i64,

    /// URL identifier, e.g. `hugo2024`.
    pub slug: String,

    /// Display name.
    pub name: String,

    /// Current phase.
    pub state: ElectionState,
}

impl Election {
    /// Whether `member` may submit nominations right now.
    pub fn user_can_nominate(&self, member: Option<&MemberProfile>) -> bool {
        self.state == ElectionState::Nominating && member.is_some_and(|m| m.can_nominate)
    }

    /// Whether `member` may rank finalists right now.
    pub fn user_can_vote(&self, member: Option<&MemberProfile>) -> bool {
        self.state == ElectionState::Voting && member.is_some_and(|m| m.can_vote)
    }

    /// Whether the election currently accepts anything from `member`.
    pub fn is_open_for(&self, member: Option<&MemberProfile>) -> bool {
        self.user_can_nominate(member) || self.user_can_vote(member)
    }

    /// Machine-readable phase as seen by `member`.
    ///
    /// Open phases the member may not take part in read `not_eligible`.
    /// Anonymous visitors see the raw phase; eligibility is decided after login.
    pub fn describe_state(&self, member: Option<&MemberProfile>) -> &'static str {
        match (self.state, member) {
            (ElectionState::Nominating, Some(_)) if !self.user_can_nominate(member) => {
                "not_eligible"
            }
            (ElectionState::Voting, Some(_)) if !self.user_can_vote(member) => "not_eligible",
            (state, _) => state.as_str(),
        }
    }

    /// Human-readable phase as seen by `member`.
    pub fn pretty_state(&self, member: Option<&MemberProfile>) -> &'static str {
        match self.state {
            ElectionState::PreNomination => "Nominations are not open yet",
            ElectionState::Nominating => match member {
                Some(_) if !self.user_can_nominate(member) => {
                    "Nominations are open, but you are not eligible to nominate"
                }
                _ => "Nominations are open",
            },
            ElectionState::NominationsClosed => "Nominations are closed",
            ElectionState::Voting => match member {
                Some(_) if !self.user_can_vote(member) => {
                    "Voting is open, but you are not eligible to vote"
                }
                _ => "Voting is open",
            },
            ElectionState::VotingClosed => "Voting is closed",
        }
    }
}

/// Award category within an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub election_id: i64,
    pub name: String,
    pub description: String,
    pub ballot_position: i32,
}

/// Work or person on the final ballot for a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finalist {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub ballot_position: i32,
}

/// A category together with its finalists, in ballot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BallotCategory {
    pub category: Category,
    pub finalists: Vec<Finalist>,
}

/// Everything needed to fill in a final ballot for an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElectionBallot {
    pub election: Election,
    pub categories: Vec<BallotCategory>,
}

// ============================================================================
// Members and ranks
// ============================================================================

/// Nominating member profile, with the rights granted at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberProfile {
    pub id: i64,
    pub member_number: String,
    pub preferred_name: String,
    pub can_nominate: bool,
    pub can_vote: bool,
}

/// Stored ranked-choice vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rank {
    pub id: i64,
    pub membership_id: i64,
    pub finalist_id: i64,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Rank awaiting persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NewRank {
    pub membership_id: i64,
    pub finalist_id: i64,
    /// 1-based position within the member's ballot for the category.
    pub position: i32,
}

// ============================================================================
// Hugo packet
// ============================================================================

/// Voter packet for an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElectionPacket {
    pub id: i64,
    pub election_id: i64,
    pub name: String,
    pub s3_bucket_name: String,
    /// When false the packet is reported as not found.
    pub enabled: bool,
}

/// One downloadable file in a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketFile {
    pub id: i64,
    pub packet_id: i64,
    pub name: String,
    pub s3_object_key: StorageKey,
    pub position: i32,
}

/// Live object metadata from packet storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PacketFileMetadata {
    /// Object size in bytes.
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

/// A packet file paired with its live metadata, if storage has the object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketFileDisplay {
    pub packet_file: PacketFile,
    pub metadata: Option<PacketFileMetadata>,
}

// ============================================================================
// API responses
// ============================================================================

/// Readiness check response.
///
/// Returned by the `/ready` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One election in the list, annotated for the requesting member.
#[derive(Debug, Clone, Serialize)]
pub struct ElectionSummary {
    pub slug: String,
    pub name: String,
    pub state: ElectionState,
    pub is_open_for_user: bool,
    pub user_state: &'static str,
    pub user_pretty_state: &'static str,
}

impl ElectionSummary {
    /// Summarize `election` as seen by `member`.
    pub fn for_member(election: &Election, member: Option<&MemberProfile>) -> Self {
        Self {
            slug: election.slug.clone(),
            name: election.name.clone(),
            state: election.state,
            is_open_for_user: election.is_open_for(member),
            user_state: election.describe_state(member),
            user_pretty_state: election.pretty_state(member),
        }
    }
}

/// Response for `GET /api/v1/elections`.
#[derive(Debug, Clone, Serialize)]
pub struct ElectionListResponse {
    pub elections: Vec<ElectionSummary>,
    /// Whether the username login form should be offered.
    pub username_login_enabled: bool,
}

/// Response for the nomination page.
#[derive(Debug, Clone, Serialize)]
pub struct NominationFormResponse {
    pub election: Election,
    pub member: MemberProfile,
    pub categories: Vec<Category>,
    pub nominations_per_category: u32,
}

/// Response for the voting page.
#[derive(Debug, Clone, Serialize)]
pub struct VotingBallotResponse {
    pub election: Election,
    pub member: MemberProfile,
    pub categories: Vec<BallotCategory>,
    pub ranks: Vec<Rank>,
}

/// Response for the packet index.
#[derive(Debug, Clone, Serialize)]
pub struct PacketIndexResponse {
    pub election: Election,
    pub packet: ElectionPacket,
    pub files: Vec<PacketFileDisplay>,
}
