//! Database fixtures.
//!
//! Each helper inserts one row and returns its id. They panic on failure.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Insert an election in `state` (e.g. `"voting"`).
pub async fn seed_election(pool: &PgPool, slug: &str, state: &str) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO elections (slug, name, state) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(slug)
    .bind(format!("Election {slug}"))
    .bind(state)
    .fetch_one(pool)
    .await
    .expect("insert election");
    id
}

/// Change an election's phase.
pub async fn set_election_state(pool: &PgPool, election_id: i64, state: &str) {
    sqlx::query("UPDATE elections SET state = $2 WHERE id = $1")
        .bind(election_id)
        .bind(state)
        .execute(pool)
        .await
        .expect("update election state");
}

pub async fn seed_category(pool: &PgPool, election_id: i64, name: &str, ballot_position: i32) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO categories (election_id, name, description, ballot_position)
         VALUES ($1, $2, '', $3) RETURNING id",
    )
    .bind(election_id)
    .bind(name)
    .bind(ballot_position)
    .fetch_one(pool)
    .await
    .expect("insert category");
    id
}

pub async fn seed_finalist(pool: &PgPool, category_id: i64, name: &str, ballot_position: i32) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO finalists (category_id, name, ballot_position) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(category_id)
    .bind(name)
    .bind(ballot_position)
    .fetch_one(pool)
    .await
    .expect("insert finalist");
    id
}

/// Insert a member with the given rights.
pub async fn seed_member(pool: &PgPool, member_number: &str, can_nominate: bool, can_vote: bool) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO members (member_number, preferred_name, can_nominate, can_vote)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(member_number)
    .bind(format!("Member {member_number}"))
    .bind(can_nominate)
    .bind(can_vote)
    .fetch_one(pool)
    .await
    .expect("insert member");
    id
}

/// Insert a rank for a member.
pub async fn seed_rank(pool: &PgPool, member_id: i64, finalist_id: i64, position: i32) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO ranks (membership_id, finalist_id, position) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(member_id)
    .bind(finalist_id)
    .bind(position)
    .fetch_one(pool)
    .await
    .expect("insert rank");
    id
}

pub async fn seed_packet(pool: &PgPool, election_id: i64, bucket: &str, enabled: bool) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO election_packets (election_id, name, s3_bucket_name, enabled)
         VALUES ($1, 'Hugo Voter Packet', $2, $3) RETURNING id",
    )
    .bind(election_id)
    .bind(bucket)
    .bind(enabled)
    .fetch_one(pool)
    .await
    .expect("insert packet");
    id
}

pub async fn seed_packet_file(
    pool: &PgPool,
    packet_id: i64,
    name: &str,
    s3_object_key: &str,
    position: i32,
) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO packet_files (packet_id, name, s3_object_key, position)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(packet_id)
    .bind(name)
    .bind(s3_object_key)
    .bind(position)
    .fetch_one(pool)
    .await
    .expect("insert packet file");
    id
}

/// Number of ranks stored for a member.
pub async fn count_ranks(pool: &PgPool, member_id: i64) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ranks WHERE membership_id = $1")
        .bind(member_id)
        .fetch_one(pool)
        .await
        .expect("count ranks");
    count
}

/// Fixed timestamp for storage objects.
pub fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("valid timestamp")
}
