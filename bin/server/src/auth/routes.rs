//! Authentication routes for login, callback, logout and registration.

use axum::{
    Form,
    extract::{Query, State, rejection::QueryRejection},
    response::{Html, IntoResponse, Redirect},
};
use axum_extra::extract::{CookieJar, cookie::SignedCookieJar};
use recipes_identity::{LoginState, UserDetails};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{
    AppState,
    callback::CallbackParams,
    csrf::CsrfToken,
    middleware::{Auth, RequireUser},
};
use crate::{error::AuthError, pages};

/// Query parameters for the login entry point.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
}

/// Starts the login flow by redirecting to the identity provider.
///
/// Issues a fresh nonce on every call, so an abandoned attempt never blocks
/// the next one.
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> impl IntoResponse {
    let (nonce, cookie) = state.nonces.issue();
    let login_state = LoginState::new(nonce, query.next.as_deref());
    let url = state.oauth.authorization_url(&login_state.encode());

    debug!(next = login_state.destination(), "Redirecting to identity provider");
    (jar.add(cookie), Redirect::temporary(&url))
}

/// Handles the provider's redirect back after the user authenticates.
///
/// The nonce cookie is expired on every outcome, including rejections.
pub async fn callback(
    State(state): State<AppState>,
    query: Result<Query<CallbackParams>, QueryRejection>,
    nonce_jar: CookieJar,
    session_jar: SignedCookieJar,
) -> impl IntoResponse {
    let params = query.map(|Query(params)| params).unwrap_or_default();
    let (nonce_jar, expected) = state.nonces.consume(nonce_jar);

    let result = state
        .callback()
        .run(expected, params, session_jar)
        .await
        .map(|(session_jar, destination)| (session_jar, Redirect::to(destination.path())));

    (nonce_jar, result)
}

/// Logs the user out and rotates the session token.
pub async fn logout(
    State(state): State<AppState>,
    RequireUser(id): RequireUser,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let jar = state.sessions.clear(jar).await?;
    info!(%id, "User logged out");
    Ok((jar, Redirect::to("/")))
}

/// Shows the registration-completion form.
pub async fn registration_form(RequireUser(_): RequireUser, csrf: CsrfToken) -> Html<String> {
    Html(pages::registration_form(
        &UserDetails::default(),
        &BTreeMap::new(),
        &csrf,
    ))
}

/// Validates and stores the details submitted on the registration form.
pub async fn complete_registration(
    State(state): State<AppState>,
    RequireUser(id): RequireUser,
    csrf: CsrfToken,
    Form(details): Form<UserDetails>,
) -> Result<axum::response::Response, AuthError> {
    let problems = details.validate();
    if !problems.is_empty() {
        debug!(?problems, "User details failed validation");
        return Ok(Html(pages::registration_form(&details, &problems, &csrf)).into_response());
    }

    state.registry.update_details(&id, &details).await?;
    info!(%id, "Completed registration");
    Ok(Redirect::to("/").into_response())
}

/// Home page.
pub async fn index(
    State(state): State<AppState>,
    Auth(context): Auth,
    csrf: CsrfToken,
) -> Result<Html<String>, AuthError> {
    let user = match context.identity() {
        Some(id) => state.registry.find(id).await?,
        None => None,
    };
    Ok(Html(pages::index(user.as_ref(), &csrf)))
}
