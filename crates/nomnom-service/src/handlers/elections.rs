//! Election handlers.
//!
//! - `GET /api/v1/elections` - Election list (optional session)
//! - `GET /api/v1/elections/{election_id}` - Redirect to the mode the member can use
//! - `GET /api/v1/elections/{election_id}/closed` - Election detail
//! - `GET /api/v1/elections/{election_id}/nominate` - Nomination form (guarded)
//! - `GET /api/v1/elections/{election_id}/vote` - Final ballot (guarded)
//!
//! Guarded handlers receive the `Election` and `MemberProfile` resolved by
//! `require_election_access`.

use crate::errors::NomnomError;
use crate::handlers::found;
use crate::models::{
    Election, ElectionListResponse, ElectionSummary, MemberProfile, NominationFormResponse,
    VotingBallotResponse,
};
use crate::repositories::{ElectionsRepository, MembersRepository, RanksRepository};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::Uri,
    response::Response,
    Extension, Json,
};
use common::jwt::MemberClaims;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

/// Member profile for an optional session.
async fn current_member(
    pool: &PgPool,
    claims: Option<&MemberClaims>,
) -> Result<Option<MemberProfile>, NomnomError> {
    match claims.and_then(MemberClaims::member_id) {
        Some(id) => MembersRepository::get_by_id(pool, id).await,
        None => Ok(None),
    }
}

async fn election_by_slug(pool: &PgPool, slug: &str) -> Result<Election, NomnomError> {
    ElectionsRepository::get_by_slug(pool, slug)
        .await?
        .ok_or_else(|| NomnomError::NotFound("Election not found".to_string()))
}

/// Handler for GET /api/v1/elections
#[instrument(skip_all, name = "nomnom.handlers.list_elections")]
pub async fn list_elections(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<MemberClaims>>,
) -> Result<Json<ElectionListResponse>, NomnomError> {
    let member = current_member(&state.pool, claims.as_deref()).await?;
    let elections = ElectionsRepository::list(&state.pool).await?;

    let elections = elections
        .iter()
        .map(|e| ElectionSummary::for_member(e, member.as_ref()))
        .collect();

    Ok(Json(ElectionListResponse {
        elections,
        username_login_enabled: state.config.allow_username_login,
    }))
}

/// Handler for GET /api/v1/elections/{election_id}
///
/// Sends the member to `nominate` if they can nominate, else to `vote` if
/// they can vote, else to `closed`. The query string is carried over.
#[instrument(skip_all, name = "nomnom.handlers.election_mode_redirect", fields(election_id = %election_id))]
pub async fn election_mode_redirect(
    State(state): State<Arc<AppState>>,
    Path(election_id): Path<String>,
    claims: Option<Extension<MemberClaims>>,
    uri: Uri,
) -> Result<Response, NomnomError> {
    let election = election_by_slug(&state.pool, &election_id).await?;
    let member = current_member(&state.pool, claims.as_deref()).await?;

    let mode = if election.user_can_nominate(member.as_ref()) {
        "nominate"
    } else if election.user_can_vote(member.as_ref()) {
        "vote"
    } else {
        "closed"
    };

    let mut location = format!("{}/{mode}", uri.path().trim_end_matches('/'));
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }

    Ok(found(&location))
}

/// Handler for GET /api/v1/elections/{election_id}/closed
#[instrument(skip_all, name = "nomnom.handlers.closed_election", fields(election_id = %election_id))]
pub async fn closed_election(
    State(state): State<Arc<AppState>>,
    Path(election_id): Path<String>,
    claims: Option<Extension<MemberClaims>>,
) -> Result<Json<ElectionSummary>, NomnomError> {
    let election = election_by_slug(&state.pool, &election_id).await?;
    let member = current_member(&state.pool, claims.as_deref()).await?;

    Ok(Json(ElectionSummary::for_member(&election, member.as_ref())))
}

/// Handler for GET /api/v1/elections/{election_id}/nominate
#[instrument(skip_all, name = "nomnom.handlers.nominate", fields(election_id = %election.slug))]
pub async fn nominate(
    State(state): State<Arc<AppState>>,
    Extension(election): Extension<Election>,
    Extension(member): Extension<MemberProfile>,
) -> Result<Json<NominationFormResponse>, NomnomError> {
    let categories = ElectionsRepository::categories(&state.pool, election.id).await?;

    Ok(Json(NominationFormResponse {
        election,
        member,
        categories,
        nominations_per_category: state.config.nomination_count,
    }))
}

/// Handler for GET /api/v1/elections/{election_id}/vote
///
/// The ballot plus whatever the member has ranked so far.
#[instrument(skip_all, name = "nomnom.handlers.vote", fields(election_id = %election.slug))]
pub async fn vote(
    State(state): State<Arc<AppState>>,
    Extension(election): Extension<Election>,
    Extension(member): Extension<MemberProfile>,
) -> Result<Json<VotingBallotResponse>, NomnomError> {
    let ranks = RanksRepository::for_member(&state.pool, member.id, election.id).await?;
    let ballot = ElectionsRepository::ballot(&state.pool, election).await?;

    Ok(Json(VotingBallotResponse {
        election: ballot.election,
        member,
        categories: ballot.categories,
        ranks,
    }))
}
