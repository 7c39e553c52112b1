//! Synthetic final ballots for load and UI testing.
//!
//! `generate_ballot` is pure given its random source; `submit_fake_ballots`
//! wires it to the database for the `fake-ballots` command.

use crate::errors::NomnomError;
use crate::models::{ElectionBallot, MemberProfile, NewRank};
use crate::repositories::{ElectionsRepository, MembersRepository, RanksRepository};
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::PgPool;
use tracing::instrument;

/// Default chance that a member votes in a given category at all.
pub const DEFAULT_CATEGORY_VOTE_PROBABILITY: f64 = 0.99;

/// Default chance that a finalist makes it onto a voted category's ballot.
pub const DEFAULT_FINALIST_VOTE_PROBABILITY: f64 = 0.90;

/// Probabilities driving ballot generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallotProbabilities {
    pub category_vote: f64,
    pub finalist_vote: f64,
}

impl Default for BallotProbabilities {
    fn default() -> Self {
        Self {
            category_vote: DEFAULT_CATEGORY_VOTE_PROBABILITY,
            finalist_vote: DEFAULT_FINALIST_VOTE_PROBABILITY,
        }
    }
}

impl BallotProbabilities {
    /// Build probabilities, rejecting values outside `[0, 1]`.
    pub fn new(category_vote: f64, finalist_vote: f64) -> Result<Self, NomnomError> {
        for (name, value) in [
            ("category vote probability", category_vote),
            ("finalist vote probability", finalist_vote),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(NomnomError::BadRequest(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }

        Ok(Self {
            category_vote,
            finalist_vote,
        })
    }
}

/// Bernoulli draw; `p = 0` never fires and `p = 1` always does.
fn draw<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.gen::<f64>() < p
}

/// Generate one member's final ballot for `ballot`'s election.
///
/// Per category: decide whether the member votes there, shuffle the
/// finalists, keep each with `finalist_vote` probability and number the
/// survivors 1..=K in shuffled order.
pub fn generate_ballot<R: Rng + ?Sized>(
    ballot: &ElectionBallot,
    member: &MemberProfile,
    probabilities: &BallotProbabilities,
    rng: &mut R,
) -> Vec<NewRank> {
    let mut ranks = Vec::new();

    for entry in &ballot.categories {
        if !draw(rng, probabilities.category_vote) {
            continue;
        }

        let mut finalists: Vec<_> = entry.finalists.iter().collect();
        finalists.shuffle(rng);

        let kept: Vec<_> = finalists
            .into_iter()
            .filter(|_| draw(rng, probabilities.finalist_vote))
            .collect();

        ranks.extend((1..).zip(kept).map(|(position, finalist)| NewRank {
            membership_id: member.id,
            finalist_id: finalist.id,
            position,
        }));
    }

    ranks
}

/// Outcome of a `submit_fake_ballots` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeBallotSummary {
    pub election: String,
    /// Members with no ranks in the election before the run.
    pub members_without_ranks: i64,
    pub ballots_submitted: usize,
    pub ranks_written: usize,
}

/// Submit synthetic ballots for up to `voter_count` members who have not
/// voted in the election identified by `slug`.
///
/// Each member's ranks are written in a single transaction.
#[instrument(skip_all, name = "nomnom.services.fake_ballots", fields(election = %slug, voter_count = voter_count))]
pub async fn submit_fake_ballots<R: Rng + ?Sized>(
    pool: &PgPool,
    slug: &str,
    voter_count: u32,
    probabilities: &BallotProbabilities,
    rng: &mut R,
) -> Result<FakeBallotSummary, NomnomError> {
    let election = ElectionsRepository::get_by_slug(pool, slug)
        .await?
        .ok_or_else(|| NomnomError::NotFound(format!("Election '{slug}' not found")))?;

    let ballot = ElectionsRepository::ballot(pool, election).await?;

    let members_without_ranks = MembersRepository::count_without_ranks(pool, ballot.election.id).await?;
    tracing::info!(
        target: "nomnom.services.fake_ballots",
        members_without_ranks,
        "We have {} members without ranks",
        members_without_ranks
    );

    let members =
        MembersRepository::list_without_ranks(pool, ballot.election.id, i64::from(voter_count))
            .await?;

    if members.len() < voter_count as usize {
        tracing::warn!(
            target: "nomnom.services.fake_ballots",
            requested = voter_count,
            available = members.len(),
            "Fewer members without ranks than requested"
        );
    }

    let mut ranks_written = 0;
    for member in &members {
        let ranks = generate_ballot(&ballot, member, probabilities, rng);
        RanksRepository::insert_ballot(pool, &ranks).await?;
        ranks_written += ranks.len();

        tracing::info!(
            target: "nomnom.services.fake_ballots",
            member_id = member.id,
            rank_count = ranks.len(),
            "Submitted ballot"
        );
    }

    Ok(FakeBallotSummary {
        election: ballot.election.slug,
        members_without_ranks,
        ballots_submitted: members.len(),
        ranks_written,
    })
}
