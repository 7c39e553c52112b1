//! Election access guard.
//!
//! A guard is a predicate over (subject, election) evaluated before the
//! handler runs. Its decision is one of allow, redirect-to-login, or
//! forbidden. On allow, the resolved `Election` and `MemberProfile` are
//! attached to the request so handlers never look them up again.

use crate::errors::NomnomError;
use crate::middleware::auth::{login_redirect, ClaimsExt};
use crate::models::{Election, MemberProfile};
use crate::observability::metrics::record_access_denial;
use crate::repositories::{ElectionsRepository, MembersRepository};
use crate::routes::AppState;
use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::jwt::MemberClaims;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Outcome of an access predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    RedirectToAuth,
    Forbidden,
}

impl AccessDecision {
    /// Label used for the access denial metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::Allow => "allow",
            AccessDecision::RedirectToAuth => "redirect_to_auth",
            AccessDecision::Forbidden => "forbidden",
        }
    }
}

/// Who is asking.
///
/// An authenticated session whose member profile no longer exists is
/// `Authenticated(None)`.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Anonymous,
    Authenticated(Option<&'a MemberProfile>),
}

pub type AccessPredicate = fn(&Subject<'_>, &Election) -> AccessDecision;

/// Members with voting rights while the election is voting.
pub fn member_can_vote(subject: &Subject<'_>, election: &Election) -> AccessDecision {
    match subject {
        Subject::Anonymous => AccessDecision::RedirectToAuth,
        Subject::Authenticated(member) if election.user_can_vote(*member) => AccessDecision::Allow,
        Subject::Authenticated(_) => AccessDecision::Forbidden,
    }
}

/// Members with nominating rights while the election is nominating.
pub fn member_can_nominate(subject: &Subject<'_>, election: &Election) -> AccessDecision {
    match subject {
        Subject::Anonymous => AccessDecision::RedirectToAuth,
        Subject::Authenticated(member) if election.user_can_nominate(*member) => {
            AccessDecision::Allow
        }
        Subject::Authenticated(_) => AccessDecision::Forbidden,
    }
}

/// State for `require_election_access`.
#[derive(Clone)]
pub struct ElectionGuard {
    pub state: Arc<AppState>,

    /// Guard name, used in logs and metrics.
    pub name: &'static str,

    pub predicate: AccessPredicate,
}

impl ElectionGuard {
    pub fn new(state: Arc<AppState>, name: &'static str, predicate: AccessPredicate) -> Self {
        Self {
            state,
            name,
            predicate,
        }
    }
}

/// Guard middleware for routes under `/api/v1/elections/:election_id`.
///
/// # Response
///
/// - 404 if the election does not exist
/// - 302 to the login page when the predicate asks for authentication
/// - 403 when the predicate forbids access
/// - Otherwise continues with `Election` (and `MemberProfile`) in extensions
#[instrument(skip_all, name = "nomnom.middleware.election_access")]
pub async fn require_election_access(
    State(guard): State<ElectionGuard>,
    Path(params): Path<HashMap<String, String>>,
    mut req: Request,
    next: Next,
) -> Result<Response, NomnomError> {
    let slug = params
        .get("election_id")
        .ok_or_else(|| NomnomError::NotFound("Election not found".to_string()))?;

    let pool = &guard.state.pool;

    let election = ElectionsRepository::get_by_slug(pool, slug)
        .await?
        .ok_or_else(|| NomnomError::NotFound("Election not found".to_string()))?;

    let claims = req.claims().cloned();

    let member = match claims.as_ref().and_then(MemberClaims::member_id) {
        Some(id) => MembersRepository::get_by_id(pool, id).await?,
        None => None,
    };

    let subject = match claims {
        Some(_) => Subject::Authenticated(member.as_ref()),
        None => Subject::Anonymous,
    };

    let decision = (guard.predicate)(&subject, &election);

    match decision {
        AccessDecision::Allow => {}
        AccessDecision::RedirectToAuth => {
            tracing::debug!(target: "nomnom.middleware.access", guard = guard.name, election = %election.slug, "Redirecting to login");
            record_access_denial(guard.name, decision.as_str());
            return Ok(login_redirect(&guard.state.config.login_url, &req));
        }
        AccessDecision::Forbidden => {
            tracing::debug!(target: "nomnom.middleware.access", guard = guard.name, election = %election.slug, "Access forbidden");
            record_access_denial(guard.name, decision.as_str());
            return Err(NomnomError::Forbidden(
                "You may not access this page for this election".to_string(),
            ));
        }
    }

    if let Some(member) = member {
        req.extensions_mut().insert(member);
    }
    req.extensions_mut().insert(election);

    Ok(next.run(req).await.into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ElectionState;

    fn election(state: ElectionState) -> Election {
        Election {
            id: 1,
            slug: "hugo2024".to_string(),
            name: "Hugo Awards 2024".to_string(),
            state,
        }
    }

    fn member(can_nominate: bool, can_vote: bool) -> MemberProfile {
        MemberProfile {
            id: 10,
            member_number: "A1234".to_string(),
            preferred_name: "Ada".to_string(),
            can_nominate,
            can_vote,
        }
    }

    #[test]
    fn test_anonymous_is_sent_to_login() {
        let voting = election(ElectionState::Voting);
        assert_eq!(
            member_can_vote(&Subject::Anonymous, &voting),
            AccessDecision::RedirectToAuth
        );
        assert_eq!(
            member_can_nominate(&Subject::Anonymous, &election(ElectionState::Nominating)),
            AccessDecision::RedirectToAuth
        );
    }

    #[test]
    fn test_voter_allowed_only_while_voting() {
        let voter = member(false, true);
        let subject = Subject::Authenticated(Some(&voter));

        assert_eq!(
            member_can_vote(&subject, &election(ElectionState::Voting)),
            AccessDecision::Allow
        );
        assert_eq!(
            member_can_vote(&subject, &election(ElectionState::VotingClosed)),
            AccessDecision::Forbidden
        );
        assert_eq!(
            member_can_vote(&subject, &election(ElectionState::Nominating)),
            AccessDecision::Forbidden
        );
    }

    #[test]
    fn test_member_without_rights_is_forbidden() {
        let nobody = member(false, false);
        let subject = Subject::Authenticated(Some(&nobody));

        assert_eq!(
            member_can_vote(&subject, &election(ElectionState::Voting)),
            AccessDecision::Forbidden
        );
        assert_eq!(
            member_can_nominate(&subject, &election(ElectionState::Nominating)),
            AccessDecision::Forbidden
        );
    }

    #[test]
    fn test_nominator_allowed_only_while_nominating() {
        let nominator = member(true, false);
        let subject = Subject::Authenticated(Some(&nominator));

        assert_eq!(
            member_can_nominate(&subject, &election(ElectionState::Nominating)),
            AccessDecision::Allow
        );
        assert_eq!(
            member_can_nominate(&subject, &election(ElectionState::PreNomination)),
            AccessDecision::Forbidden
        );
    }

    #[test]
    fn test_session_without_profile_is_forbidden() {
        let subject = Subject::Authenticated(None);
        assert_eq!(
            member_can_vote(&subject, &election(ElectionState::Voting)),
            AccessDecision::Forbidden
        );
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(AccessDecision::Allow.as_str(), "allow");
        assert_eq!(AccessDecision::RedirectToAuth.as_str(), "redirect_to_auth");
        assert_eq!(AccessDecision::Forbidden.as_str(), "forbidden");
    }
}
