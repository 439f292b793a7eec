//! # davacl-http
//!
//! HTTP surface for the davacl engine.
//!
//! [`router`] answers the WebDAV `ACL` method on any path: the caller is
//! taken from the [`AuthenticatedUser`] that `davacl-auth` puts into the
//! request extensions, the body is a JSON array of ACEs, and the outcome is
//! either `200 OK` with an empty body or an error status with a JSON body
//! `{"error": {"category", "message"}}`. Every other method answers
//! `405 Method Not Allowed`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod error;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::StatusCode;

use davacl::{AccessControl, HookEvent, HookOutcome, InterceptorChain};
use davacl_auth::{username_from_parts, AuthConfig, AuthLayer, CredentialValidator};
use davacl_core::{normalize_href, Error};

pub use davacl_auth::AuthenticatedUser;
pub use error::ApiError;

/// The custom method this surface serves.
pub const ACL_METHOD: &str = "ACL";

/// Largest accepted ACL body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state of the router.
#[derive(Clone)]
pub struct AppState {
    control: AccessControl,
    chain: Arc<InterceptorChain>,
}

impl AppState {
    /// State running only the engine's own interceptor.
    pub fn new(control: AccessControl) -> Self {
        let chain = Arc::new(control.chain());
        Self { control, chain }
    }

    /// State running a caller-assembled chain.
    pub fn with_chain(control: AccessControl, chain: InterceptorChain) -> Self {
        Self {
            control,
            chain: Arc::new(chain),
        }
    }

    /// The engine behind this state.
    pub fn control(&self) -> &AccessControl {
        &self.control
    }
}

/// Router answering the `ACL` method on every path.
pub fn router(state: AppState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

/// [`router`] behind Basic authentication.
pub fn router_with_auth<V: CredentialValidator>(
    state: AppState,
    validator: Arc<V>,
    auth: AuthConfig,
) -> Router {
    router(state).layer(AuthLayer::new(validator, auth))
}

async fn handle(State(state): State<AppState>, req: Request) -> Response {
    if req.method().as_str() != ACL_METHOD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(http::header::ALLOW, ACL_METHOD)],
        )
            .into_response();
    }
    match acl(&state, req).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

async fn acl(state: &AppState, req: Request) -> Result<(), Error> {
    let (parts, body) = req.into_parts();
    let gate = state.control.gate();
    let caller = gate.current_user_principal(username_from_parts(&parts));
    let uri = normalize_href(parts.uri.path(), &gate.config().base_uri);
    log::debug!("ACL /{uri} by {caller:?}");

    let before = HookEvent::BeforeMethod {
        method: ACL_METHOD,
        uri: &uri,
    };
    match state.chain.dispatch(&caller, &before).await {
        HookOutcome::Continue => {}
        HookOutcome::Handled => return Ok(()),
        HookOutcome::Deny(err) => return Err(err),
    }

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| Error::BadRequest(format!("Unreadable request body: {e}")))?;

    let event = HookEvent::UnknownMethod {
        method: ACL_METHOD,
        uri: &uri,
        body: &body,
    };
    match state.chain.dispatch(&caller, &event).await {
        HookOutcome::Handled => Ok(()),
        HookOutcome::Deny(err) => Err(err),
        HookOutcome::Continue => Err(Error::MethodNotAllowed(uri.clone())),
    }
}
