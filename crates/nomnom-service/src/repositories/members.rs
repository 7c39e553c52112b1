//! Members repository.
//!
//! Member profiles are created by the login pipeline; this service only
//! reads them.

use crate::errors::NomnomError;
use crate::models::MemberProfile;
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Members repository for database operations.
pub struct MembersRepository;

impl MembersRepository {
    /// Member profile by id.
    #[instrument(skip_all, name = "nomnom.repo.get_member")]
    pub async fn get_by_id(
        pool: &PgPool,
        member_id: i64,
    ) -> Result<Option<MemberProfile>, NomnomError> {
        let start = Instant::now();

        let query_result: Result<Option<MemberRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, member_number, preferred_name, can_nominate, can_vote
            FROM members
            WHERE id = $1
            "#,
        )
        .bind(member_id)
        .fetch_optional(pool)
        .await;

        let (status, row) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("get_member", status, start.elapsed());

        Ok(row?.map(MemberProfile::from))
    }

    /// Number of members with no ranks in the election.
    #[instrument(skip_all, name = "nomnom.repo.count_members_without_ranks", fields(election_id = election_id))]
    pub async fn count_without_ranks(pool: &PgPool, election_id: i64) -> Result<i64, NomnomError> {
        let start = Instant::now();

        let query_result: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM members m
            WHERE NOT EXISTS (
                SELECT 1
                FROM ranks r
                JOIN finalists f ON f.id = r.finalist_id
                JOIN categories c ON c.id = f.category_id
                WHERE r.membership_id = m.id AND c.election_id = $1
            )
            "#,
        )
        .bind(election_id)
        .fetch_one(pool)
        .await;

        let (status, row) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("count_members_without_ranks", status, start.elapsed());

        Ok(row?.0)
    }

    /// Up to `limit` members with no ranks in the election, lowest id first.
    #[instrument(skip_all, name = "nomnom.repo.list_members_without_ranks", fields(election_id = election_id, limit = limit))]
    pub async fn list_without_ranks(
        pool: &PgPool,
        election_id: i64,
        limit: i64,
    ) -> Result<Vec<MemberProfile>, NomnomError> {
        let start = Instant::now();

        let query_result: Result<Vec<MemberRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT m.id, m.member_number, m.preferred_name, m.can_nominate, m.can_vote
            FROM members m
            WHERE NOT EXISTS (
                SELECT 1
                FROM ranks r
                JOIN finalists f ON f.id = r.finalist_id
                JOIN categories c ON c.id = f.category_id
                WHERE r.membership_id = m.id AND c.election_id = $1
            )
            ORDER BY m.id
            LIMIT $2
            "#,
        )
        .bind(election_id)
        .bind(limit)
        .fetch_all(pool)
        .await;

        let (status, rows) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("list_members_without_ranks", status, start.elapsed());

        Ok(rows?.into_iter().map(MemberProfile::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: i64,
    member_number: String,
    preferred_name: String,
    can_nominate: bool,
    can_vote: bool,
}

impl From<MemberRow> for MemberProfile {
    fn from(r: MemberRow) -> Self {
        MemberProfile {
            id: r.id,
            member_number: r.member_number,
            preferred_name: r.preferred_name,
            can_nominate: r.can_nominate,
            can_vote: r.can_vote,
        }
    }
}
