//! Session middleware.
//!
//! Provides two middleware functions:
//! - `require_member` - Login required; redirects to `LOGIN_URL` otherwise
//! - `attach_member` - Optional session; never rejects
//!
//! Both accept the session from the `nomnom_session` cookie or a Bearer
//! token, validate it, and inject `MemberClaims` into request extensions.

use crate::auth::{SessionValidator, SESSION_COOKIE};
use crate::handlers::found;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use common::jwt::MemberClaims;
use std::sync::Arc;
use tracing::instrument;
use url::{form_urlencoded, Url};

/// State for the session middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Session token validator.
    pub validator: Arc<SessionValidator>,

    /// Where members without a session are sent.
    pub login_url: String,
}

/// Session token from the Authorization header or the session cookie.
///
/// A Bearer token takes precedence over the cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Claims of a valid session on the request, if any.
fn session_claims(state: &AuthState, req: &Request) -> Option<MemberClaims> {
    let token = extract_session_token(req.headers())?;

    match state.validator.validate(token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!(target: "nomnom.middleware.auth", error = %e, "Ignoring invalid session");
            None
        }
    }
}

/// Build the login redirect target for the current request.
///
/// `next` carries the path and query when the login page lives on the same
/// scheme and host (or `login_url` is relative), the absolute URL otherwise.
/// Scheme comes from `X-Forwarded-Proto`, host from `X-Forwarded-Host` or
/// `Host`.
pub fn login_redirect_url(login_url: &str, headers: &HeaderMap, uri: &Uri) -> String {
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());

    let scheme = forwarded_value(headers, "x-forwarded-proto").unwrap_or("http");
    let host = forwarded_value(headers, "x-forwarded-host")
        .or_else(|| headers.get(header::HOST).and_then(|h| h.to_str().ok()));

    let Ok(mut login) = Url::parse(login_url) else {
        // Relative login URL: same site
        let next: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("next", path)
            .finish();
        let separator = if login_url.contains('?') { '&' } else { '?' };
        return format!("{login_url}{separator}{next}");
    };

    let login_authority = login.host_str().map(|h| match login.port() {
        Some(port) => format!("{h}:{port}"),
        None => h.to_string(),
    });

    let same_site = login.scheme() == scheme && login_authority.as_deref() == host;
    let next = match host {
        Some(host) if !same_site => format!("{scheme}://{host}{path}"),
        _ => path.to_string(),
    };

    login.query_pairs_mut().append_pair("next", &next);
    login.into()
}

/// First value of a possibly comma-separated forwarding header.
fn forwarded_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// 302 to the login page for this request.
pub fn login_redirect(login_url: &str, req: &Request) -> Response {
    found(&login_redirect_url(login_url, req.headers(), req.uri()))
}

/// Login-required middleware.
///
/// # Response
///
/// - Returns 302 to `LOGIN_URL?next=...` if the session is missing or invalid
/// - Continues to next handler with `MemberClaims` in extensions otherwise
#[instrument(skip_all, name = "nomnom.middleware.require_member")]
pub async fn require_member(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(claims) = session_claims(&state, &req) else {
        tracing::debug!(target: "nomnom.middleware.auth", path = %req.uri().path(), "No session, redirecting to login");
        return login_redirect(&state.login_url, &req);
    };

    req.extensions_mut().insert(claims);

    next.run(req).await
}

/// Optional-session middleware.
///
/// Attaches `MemberClaims` when a valid session is present.
#[instrument(skip_all, name = "nomnom.middleware.attach_member")]
pub async fn attach_member(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(claims) = session_claims(&state, &req) {
        req.extensions_mut().insert(claims);
    }

    next.run(req).await
}

/// Extension trait for extracting session claims from a request.
pub trait ClaimsExt {
    /// Returns `None` if no session middleware attached claims.
    fn claims(&self) -> Option<&MemberClaims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&MemberClaims> {
        self.extensions().get::<MemberClaims>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::session::{SessionSigner, DEFAULT_SESSION_TTL};
    use axum::{
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use common::secret::SecretString;
    use tower::ServiceExt;

    const SECRET: &str = "middleware-test-secret-with-32-bytes!!";

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState {
            validator: Arc::new(SessionValidator::new(&SecretString::from(SECRET), 300)),
            login_url: "/login/".to_string(),
        })
    }

    fn token(member_id: i64) -> String {
        SessionSigner::new(&SecretString::from(SECRET), DEFAULT_SESSION_TTL)
            .issue(member_id)
            .unwrap()
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let h = headers(&[("cookie", "theme=dark; nomnom_session=abc.def.ghi; lang=en")]);
        assert_eq!(extract_session_token(&h), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_token_prefers_bearer() {
        let h = headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "nomnom_session=from-cookie"),
        ]);
        assert_eq!(extract_session_token(&h), Some("from-header"));
    }

    #[test]
    fn test_extract_token_missing() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
        let h = headers(&[("cookie", "nomnom_session=; other=1")]);
        assert_eq!(extract_session_token(&h), None);
        let h = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert_eq!(extract_session_token(&h), None);
    }

    #[test]
    fn test_login_redirect_relative_login_url() {
        let uri: Uri = "/api/v1/elections/hugo2024/vote?x=1".parse().unwrap();
        let url = login_redirect_url("/login/", &headers(&[("host", "vote.example.org")]), &uri);
        assert_eq!(
            url,
            "/login/?next=%2Fapi%2Fv1%2Felections%2Fhugo2024%2Fvote%3Fx%3D1"
        );
    }

    #[test]
    fn test_login_redirect_keeps_existing_query() {
        let uri: Uri = "/a".parse().unwrap();
        let url = login_redirect_url("/login/?mode=oauth", &HeaderMap::new(), &uri);
        assert_eq!(url, "/login/?mode=oauth&next=%2Fa");
    }

    #[test]
    fn test_login_redirect_same_site_absolute_login_url() {
        let uri: Uri = "/a".parse().unwrap();
        let h = headers(&[("host", "vote.example.org"), ("x-forwarded-proto", "https")]);
        let url = login_redirect_url("https://vote.example.org/login/", &h, &uri);
        assert_eq!(url, "https://vote.example.org/login/?next=%2Fa");
    }

    #[test]
    fn test_login_redirect_other_site_uses_absolute_next() {
        let uri: Uri = "/a?b=c".parse().unwrap();
        let h = headers(&[
            ("host", "internal:8080"),
            ("x-forwarded-host", "vote.example.org"),
            ("x-forwarded-proto", "https"),
        ]);
        let url = login_redirect_url("https://auth.example.org/login/", &h, &uri);
        assert_eq!(
            url,
            "https://auth.example.org/login/?next=https%3A%2F%2Fvote.example.org%2Fa%3Fb%3Dc"
        );
    }

    #[test]
    fn test_login_redirect_scheme_mismatch_is_other_site() {
        let uri: Uri = "/a".parse().unwrap();
        let h = headers(&[("host", "vote.example.org")]);
        let url = login_redirect_url("https://vote.example.org/login/", &h, &uri);
        assert_eq!(
            url,
            "https://vote.example.org/login/?next=http%3A%2F%2Fvote.example.org%2Fa"
        );
    }

    async fn whoami(Extension(claims): Extension<MemberClaims>) -> String {
        claims.sub
    }

    fn protected_app() -> Router {
        Router::new()
            .route("/secret", get(whoami))
            .route_layer(middleware::from_fn_with_state(auth_state(), require_member))
    }

    #[tokio::test]
    async fn test_require_member_redirects_without_session() {
        let request = axum::http::Request::builder()
            .uri("/secret")
            .body(Body::empty())
            .unwrap();

        let response = protected_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login/?next=%2Fsecret"
        );
    }

    #[tokio::test]
    async fn test_require_member_redirects_with_invalid_session() {
        let request = axum::http::Request::builder()
            .uri("/secret")
            .header(header::COOKIE, "nomnom_session=not.a.token")
            .body(Body::empty())
            .unwrap();

        let response = protected_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_require_member_attaches_claims() {
        let request = axum::http::Request::builder()
            .uri("/secret")
            .header(header::COOKIE, format!("nomnom_session={}", token(7)))
            .body(Body::empty())
            .unwrap();

        let response = protected_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(&body[..], b"7");
    }

    #[tokio::test]
    async fn test_attach_member_never_rejects() {
        async fn maybe(claims: Option<Extension<MemberClaims>>) -> &'static str {
            if claims.is_some() {
                "member"
            } else {
                "anonymous"
            }
        }

        let app = Router::new()
            .route("/", get(maybe))
            .route_layer(middleware::from_fn_with_state(auth_state(), attach_member));

        let request = axum::http::Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, "Bearer garbage")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(&body[..], b"anonymous");

        let request = axum::http::Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(3)))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(&body[..], b"member");
    }
}
