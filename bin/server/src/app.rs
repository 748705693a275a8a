//! Router construction.
//!
//! Request pipeline, outermost first: request id, trace span, request id
//! propagation, panic recovery, `authenticate`, `verify_csrf`, then the
//! route. Protected routes add `require_authentication` as a route layer.

use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info_span;
use ulid::Ulid;

use crate::auth::{AppState, authenticate, require_authentication, routes, verify_csrf};

/// Request id header.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates a ULID for each request.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUlid;

impl MakeRequestId for MakeRequestUlid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Ulid::new().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/auth/complete-registration",
            get(routes::registration_form).post(routes::complete_registration),
        )
        .route("/auth/logout", post(routes::logout))
        .route_layer(middleware::from_fn(require_authentication));

    Router::new()
        .route("/", get(routes::index))
        .route("/auth/login", get(routes::login))
        .route("/auth/callback", get(routes::callback))
        .merge(protected)
        .layer(middleware::from_fn(verify_csrf))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUlid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default();
                    info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::new()),
        )
        .with_state(state)
}
