//! Ranks repository.
//!
//! A rank is one member's ordinal preference for one finalist.

use crate::errors::NomnomError;
use crate::models::{NewRank, Rank};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Ranks repository for database operations.
pub struct RanksRepository;

impl RanksRepository {
    /// The member's ranks in one election, by category then position.
    #[instrument(skip_all, name = "nomnom.repo.list_member_ranks", fields(election_id = election_id))]
    pub async fn for_member(
        pool: &PgPool,
        member_id: i64,
        election_id: i64,
    ) -> Result<Vec<Rank>, NomnomError> {
        let start = Instant::now();

        let query_result: Result<Vec<RankRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT r.id, r.membership_id, r.finalist_id, r.position, r.created_at
            FROM ranks r
            JOIN finalists f ON f.id = r.finalist_id
            JOIN categories c ON c.id = f.category_id
            WHERE r.membership_id = $1 AND c.election_id = $2
            ORDER BY c.ballot_position, c.id, r.position, r.id
            "#,
        )
        .bind(member_id)
        .bind(election_id)
        .fetch_all(pool)
        .await;

        let (status, rows) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("list_member_ranks", status, start.elapsed());

        Ok(rows?
            .into_iter()
            .map(|r| Rank {
                id: r.id,
                membership_id: r.membership_id,
                finalist_id: r.finalist_id,
                position: r.position,
                created_at: r.created_at,
            })
            .collect())
    }

    /// Persist one member's ballot atomically.
    ///
    /// Either every rank is written or none is.
    #[instrument(skip_all, name = "nomnom.repo.insert_ballot", fields(rank_count = ranks.len()))]
    pub async fn insert_ballot(pool: &PgPool, ranks: &[NewRank]) -> Result<(), NomnomError> {
        let start = Instant::now();

        let result = Self::insert_ballot_tx(pool, ranks).await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_db_query("insert_ballot", status, start.elapsed());

        result
    }

    async fn insert_ballot_tx(pool: &PgPool, ranks: &[NewRank]) -> Result<(), NomnomError> {
        let mut tx = pool.begin().await?;

        for rank in ranks {
            sqlx::query(
                r#"
                INSERT INTO ranks (membership_id, finalist_id, position)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(rank.membership_id)
            .bind(rank.finalist_id)
            .bind(rank.position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct RankRow {
    id: i64,
    membership_id: i64,
    finalist_id: i64,
    position: i32,
    created_at: DateTime<Utc>,
}
