//! Election packet repository.
//!
//! Packets and their files. A disabled packet is treated exactly like a
//! missing one by every query here.

use crate::errors::NomnomError;
use crate::models::{ElectionPacket, PacketFile};
use crate::observability::metrics;
use common::types::StorageKey;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Packet repository for database operations.
pub struct PacketsRepository;

impl PacketsRepository {
    /// The election's packet, if it exists and is enabled.
    #[instrument(skip_all, name = "nomnom.repo.get_packet", fields(election_id = election_id))]
    pub async fn enabled_for_election(
        pool: &PgPool,
        election_id: i64,
    ) -> Result<Option<ElectionPacket>, NomnomError> {
        let start = Instant::now();

        let query_result: Result<Option<PacketRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, election_id, name, s3_bucket_name, enabled
            FROM election_packets
            WHERE election_id = $1 AND enabled
            "#,
        )
        .bind(election_id)
        .fetch_optional(pool)
        .await;

        let (status, row) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("get_packet", status, start.elapsed());

        Ok(row?.map(ElectionPacket::from))
    }

    /// Files of a packet in display order.
    #[instrument(skip_all, name = "nomnom.repo.list_packet_files", fields(packet_id = packet_id))]
    pub async fn files(pool: &PgPool, packet_id: i64) -> Result<Vec<PacketFile>, NomnomError> {
        let start = Instant::now();

        let query_result: Result<Vec<PacketFileRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, packet_id, name, s3_object_key, position
            FROM packet_files
            WHERE packet_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(packet_id)
        .fetch_all(pool)
        .await;

        let (status, rows) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("list_packet_files", status, start.elapsed());

        Ok(rows?.into_iter().map(PacketFile::from).collect())
    }

    /// A packet file together with its enabled packet.
    ///
    /// Returns `None` when the file is unknown or its packet is disabled.
    #[instrument(skip_all, name = "nomnom.repo.get_packet_file", fields(packet_file_id = packet_file_id))]
    pub async fn file_with_packet(
        pool: &PgPool,
        packet_file_id: i64,
    ) -> Result<Option<(PacketFile, ElectionPacket)>, NomnomError> {
        let start = Instant::now();

        let query_result: Result<Option<PacketFileWithPacketRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT
                pf.id, pf.packet_id, pf.name, pf.s3_object_key, pf.position,
                p.election_id, p.name AS packet_name, p.s3_bucket_name, p.enabled
            FROM packet_files pf
            JOIN election_packets p ON p.id = pf.packet_id
            WHERE pf.id = $1 AND p.enabled
            "#,
        )
        .bind(packet_file_id)
        .fetch_optional(pool)
        .await;

        let (status, row) = match query_result {
            Ok(r) => ("success", Ok(r)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_db_query("get_packet_file", status, start.elapsed());

        Ok(row?.map(|r| {
            let packet = ElectionPacket {
                id: r.packet_id,
                election_id: r.election_id,
                name: r.packet_name,
                s3_bucket_name: r.s3_bucket_name,
                enabled: r.enabled,
            };
            let file = PacketFile {
                id: r.id,
                packet_id: r.packet_id,
                name: r.name,
                s3_object_key: StorageKey::from(r.s3_object_key),
                position: r.position,
            };
            (file, packet)
        }))
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct PacketRow {
    id: i64,
    election_id: i64,
    name: String,
    s3_bucket_name: String,
    enabled: bool,
}

impl From<PacketRow> for ElectionPacket {
    fn from(r: PacketRow) -> Self {
        ElectionPacket {
            id: r.id,
            election_id: r.election_id,
            name: r.name,
            s3_bucket_name: r.s3_bucket_name,
            enabled: r.enabled,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PacketFileRow {
    id: i64,
    packet_id: i64,
    name: String,
    s3_object_key: String,
    position: i32,
}

impl From<PacketFileRow> for PacketFile {
    fn from(r: PacketFileRow) -> Self {
        PacketFile {
            id: r.id,
            packet_id: r.packet_id,
            name: r.name,
            s3_object_key: StorageKey::from(r.s3_object_key),
            position: r.position,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PacketFileWithPacketRow {
    id: i64,
    packet_id: i64,
    name: String,
    s3_object_key: String,
    position: i32,
    election_id: i64,
    packet_name: String,
    s3_bucket_name: String,
    enabled: bool,
}
