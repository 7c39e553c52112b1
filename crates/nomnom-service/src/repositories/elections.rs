//! Elections repository.
//!
//! Reads elections, their categories and finalists.

use crate::errors::NomnomError;
use crate::models::{BallotCategory, Category, Election, ElectionBallot, ElectionState, Finalist};
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Elections repository for database operations.
pub struct ElectionsRepository;

impl ElectionsRepository {
    /// All elections, by name.
    #[instrument(skip_all, name = "nomnom.repo.list_elections")]
    pub async fn list(pool: &PgPool) -> Result<Vec<Election>, NomnomError> {
        let start = Instant::now();

        let query_result: Result<Vec<ElectionRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, slug, name, state
            FROM elections
            ORDER BY name, id
            "#,
        )
        .fetch_all(pool)
        .await;

        let (status, rows) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("list_elections", status, start.elapsed());

        rows?.into_iter().map(ElectionRow::into_election).collect()
    }

    /// Election by its URL slug.
    #[instrument(skip_all, name = "nomnom.repo.get_election", fields(slug = %slug))]
    pub async fn get_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Election>, NomnomError> {
        let start = Instant::now();

        let query_result: Result<Option<ElectionRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, slug, name, state
            FROM elections
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(pool)
        .await;

        let (status, row) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("get_election", status, start.elapsed());

        row?.map(ElectionRow::into_election).transpose()
    }

    /// Categories of an election in ballot order.
    #[instrument(skip_all, name = "nomnom.repo.list_categories", fields(election_id = election_id))]
    pub async fn categories(pool: &PgPool, election_id: i64) -> Result<Vec<Category>, NomnomError> {
        let start = Instant::now();

        let query_result: Result<Vec<CategoryRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, election_id, name, description, ballot_position
            FROM categories
            WHERE election_id = $1
            ORDER BY ballot_position, id
            "#,
        )
        .bind(election_id)
        .fetch_all(pool)
        .await;

        let (status, rows) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("list_categories", status, start.elapsed());

        Ok(rows?.into_iter().map(Category::from).collect())
    }

    /// The election with every category and its finalists, in ballot order.
    #[instrument(skip_all, name = "nomnom.repo.get_ballot", fields(election_id = election.id))]
    pub async fn ballot(pool: &PgPool, election: Election) -> Result<ElectionBallot, NomnomError> {
        let categories = Self::categories(pool, election.id).await?;

        let start = Instant::now();

        let query_result: Result<Vec<FinalistRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT f.id, f.category_id, f.name, f.ballot_position
            FROM finalists f
            JOIN categories c ON c.id = f.category_id
            WHERE c.election_id = $1
            ORDER BY f.category_id, f.ballot_position, f.id
            "#,
        )
        .bind(election.id)
        .fetch_all(pool)
        .await;

        let (status, rows) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("list_finalists", status, start.elapsed());

        let finalists: Vec<Finalist> = rows?.into_iter().map(Finalist::from).collect();

        let categories = categories
            .into_iter()
            .map(|category| {
                let finalists = finalists
                    .iter()
                    .filter(|f| f.category_id == category.id)
                    .cloned()
                    .collect();
                BallotCategory {
                    category,
                    finalists,
                }
            })
            .collect();

        Ok(ElectionBallot {
            election,
            categories,
        })
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct ElectionRow {
    id: i64,
    slug: String,
    name: String,
    state: String,
}

impl ElectionRow {
    fn into_election(self) -> Result<Election, NomnomError> {
        let state: ElectionState = self
            .state
            .parse()
            .map_err(|e| NomnomError::Database(format!("election {}: {}", self.id, e)))?;

        Ok(Election {
            id: self.id,
            slug: self.slug,
            name: self.name,
            state,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    election_id: i64,
    name: String,
    description: String,
    ballot_position: i32,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Category {
            id: r.id,
            election_id: r.election_id,
            name: r.name,
            description: r.description,
            ballot_position: r.ballot_position,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FinalistRow {
    id: i64,
    category_id: i64,
    name: String,
    ballot_position: i32,
}

impl From<FinalistRow> for Finalist {
    fn from(r: FinalistRow) -> Self {
        Finalist {
            id: r.id,
            category_id: r.category_id,
            name: r.name,
            ballot_position: r.ballot_position,
        }
    }
}
