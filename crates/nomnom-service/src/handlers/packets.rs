//! Hugo packet handlers.
//!
//! - `GET /api/v1/elections/{election_id}/packet` - Packet index with live file metadata
//! - `GET /api/v1/elections/{election_id}/packet/files/{packet_file_id}` - Download redirect
//!
//! Both sit behind the `member_can_vote` guard.

use crate::errors::NomnomError;
use crate::handlers::found;
use crate::models::{Election, PacketIndexResponse};
use crate::observability::metrics::record_packet_download;
use crate::repositories::PacketsRepository;
use crate::routes::AppState;
use crate::services::packet_metadata;
use crate::services::storage::DownloadUrlSigner;
use axum::{
    extract::{Path, State},
    response::Response,
    Extension, Json,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Handler for GET /api/v1/elections/{election_id}/packet
///
/// 404 when the election has no enabled packet. A storage listing failure
/// fails the whole page with 503.
#[instrument(skip_all, name = "nomnom.handlers.packet_index", fields(election_id = %election.slug))]
pub async fn packet_index(
    State(state): State<Arc<AppState>>,
    Extension(election): Extension<Election>,
) -> Result<Json<PacketIndexResponse>, NomnomError> {
    let packet = PacketsRepository::enabled_for_election(&state.pool, election.id)
        .await?
        .ok_or_else(|| NomnomError::NotFound("Packet not found".to_string()))?;

    let files = PacketsRepository::files(&state.pool, packet.id).await?;

    let files = packet_metadata::assemble(&packet, files, &*state.storage).await?;

    Ok(Json(PacketIndexResponse {
        election,
        packet,
        files,
    }))
}

/// Handler for GET /api/v1/elections/{election_id}/packet/files/{packet_file_id}
///
/// 302 to a time-limited URL for the object. Files that are unknown, belong
/// to a disabled packet, or belong to another election are all 404.
#[instrument(skip_all, name = "nomnom.handlers.download_packet_file", fields(election_id = %election.slug, packet_file_id = packet_file_id))]
pub async fn download_packet_file(
    State(state): State<Arc<AppState>>,
    Extension(election): Extension<Election>,
    Path((_election_id, packet_file_id)): Path<(String, i64)>,
) -> Result<Response, NomnomError> {
    let found_file = PacketsRepository::file_with_packet(&state.pool, packet_file_id).await?;

    let (file, packet) = match found_file {
        Some((file, packet)) if packet.election_id == election.id => (file, packet),
        _ => {
            record_packet_download("not_found");
            return Err(NomnomError::NotFound("Packet file not found".to_string()));
        }
    };

    let expires_in = Duration::from_secs(state.config.packet_url_expiry_seconds);

    let url = state
        .storage
        .download_url(&packet.s3_bucket_name, file.s3_object_key.as_str(), expires_in)
        .await
        .map_err(|e| {
            record_packet_download("error");
            NomnomError::from(e)
        })?;

    record_packet_download("redirected");
    tracing::info!(target: "nomnom.handlers.packets", packet_file_id = file.id, "Packet file download");

    Ok(found(&url))
}
