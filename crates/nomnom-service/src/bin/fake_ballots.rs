//! fake-ballots management command
//!
//! Submits randomly generated final ballots on behalf of members who have
//! not voted yet. Used to fill a test election with data.

use anyhow::Context;
use clap::Parser;
use nomnom_service::db::connect_pool;
use nomnom_service::observability::logging;
use nomnom_service::services::ballots::{
    submit_fake_ballots, BallotProbabilities, DEFAULT_CATEGORY_VOTE_PROBABILITY,
    DEFAULT_FINALIST_VOTE_PROBABILITY,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fake-ballots")]
#[command(about = "Submit random ballots for members who have not voted", long_about = None)]
struct Args {
    /// Election slug
    election_id: String,

    /// How many members should vote
    #[arg(default_value_t = 5)]
    voter_count: u32,

    /// Chance a member votes in each category
    #[arg(long, default_value_t = DEFAULT_CATEGORY_VOTE_PROBABILITY)]
    category_probability: f64,

    /// Chance a finalist is ranked in a voted category
    #[arg(long, default_value_t = DEFAULT_FINALIST_VOTE_PROBABILITY)]
    finalist_probability: f64,

    /// Seed for reproducible ballots
    #[arg(long)]
    seed: Option<u64>,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(logging::env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let probabilities = BallotProbabilities::new(args.category_probability, args.finalist_probability)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let pool = connect_pool(&args.database_url)
        .await
        .context("Failed to connect to database")?;

    let summary = submit_fake_ballots(
        &pool,
        &args.election_id,
        args.voter_count,
        &probabilities,
        &mut rng,
    )
    .await?;

    println!(
        "{}: {} ballots submitted ({} ranks), {} members had not voted",
        summary.election,
        summary.ballots_submitted,
        summary.ranks_written,
        summary.members_without_ranks
    );

    Ok(())
}
