//! Authentication middleware and extractors for Axum.
//!
//! `authenticate` runs on every request and attaches an [`AuthContext`] and
//! the session's [`CsrfToken`] to the request extensions. `require_authentication` wraps protected routes
//! and turns anonymous requests into a redirect to the login page.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header::CACHE_CONTROL, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use recipes_core::ExternalId;
use recipes_identity::AuthContext;
use std::convert::Infallible;
use tracing::debug;
use url::form_urlencoded;

use super::{AppState, csrf::CsrfToken};
use crate::error::AuthError;

/// Login entry point.
pub const LOGIN_PATH: &str = "/auth/login";

/// Resolves the request's [`AuthContext`] and [`CsrfToken`] from its session.
///
/// A session whose identity no longer has a local record is treated as
/// anonymous.
///
/// # Errors
///
/// Fails the request if the session store or the registry fails.
pub async fn authenticate(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let session = state.sessions.current_session(&jar).await?;
    let identity = session.as_ref().and_then(|session| session.identity().cloned());

    let context = match identity {
        None => AuthContext::Anonymous,
        Some(id) => {
            if state.registry.exists(&id).await? {
                AuthContext::Authenticated(id)
            } else {
                debug!(%id, "Session refers to an unknown identity; continuing as anonymous");
                AuthContext::Anonymous
            }
        }
    };

    if let Some(session) = &session {
        request
            .extensions_mut()
            .insert(CsrfToken::new(session.csrf_token()));
    }
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Redirects anonymous requests to the login page.
///
/// The original path is passed as `next` so the callback can return there.
/// Responses to authenticated requests are marked `Cache-Control: no-store`.
pub async fn require_authentication(request: Request, next: Next) -> Response {
    let authenticated = request
        .extensions()
        .get::<AuthContext>()
        .is_some_and(AuthContext::is_authenticated);

    if !authenticated {
        return Redirect::to(&login_redirect(request.uri().path())).into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Builds the login URL that returns to `path` afterwards.
#[must_use]
pub fn login_redirect(path: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", path)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

/// Extractor for the request's authentication context.
///
/// Requests that bypassed `authenticate` read as anonymous.
#[derive(Debug, Clone)]
pub struct Auth(pub AuthContext);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Auth(
            parts
                .extensions
                .get::<AuthContext>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

/// Extractor for requiring an authenticated identity.
pub struct RequireUser(pub ExternalId);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(Auth(context)) = Auth::from_request_parts(parts, state).await;
        match context {
            AuthContext::Authenticated(id) => Ok(RequireUser(id)),
            AuthContext::Anonymous => Err(AuthError::NotAuthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{StatusCode, header::LOCATION},
        middleware,
        routing::get,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Router with one protected route whose handler counts its calls.
    fn protected(context: Option<AuthContext>, calls: Arc<AtomicUsize>) -> Router {
        let router = Router::new()
            .route(
                "/recipes/new",
                get(move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "secret"
                    }
                }),
            )
            .route_layer(middleware::from_fn(require_authentication));

        match context {
            Some(context) => router.layer(axum::Extension(context)),
            None => router,
        }
    }

    fn get_request(uri: &str) -> Request {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[test]
    fn login_redirect_encodes_path() {
        assert_eq!(login_redirect("/recipes"), "/auth/login?next=%2Frecipes");
    }

    #[tokio::test]
    async fn anonymous_request_is_redirected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = protected(Some(AuthContext::Anonymous), Arc::clone(&calls));

        let response = app
            .oneshot(get_request("/recipes/new"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "/auth/login?next=%2Frecipes%2Fnew"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_context_is_redirected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = protected(None, Arc::clone(&calls));

        let response = app
            .oneshot(get_request("/recipes/new"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn authenticated_request_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let context = AuthContext::Authenticated(ExternalId::new("108234"));
        let app = protected(Some(context), Arc::clone(&calls));

        let response = app
            .oneshot(get_request("/recipes/new"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn require_user_rejects_anonymous() {
        let app = Router::new().route(
            "/me",
            get(|RequireUser(id): RequireUser| async move { id.to_string() }),
        );

        let response = app.oneshot(get_request("/me")).await.expect("response");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], LOGIN_PATH);
    }
}
