//! Tower Basic-authentication middleware.
//!
//! `AuthLayer` and `AuthService` wrap any inner service with credential
//! validation. Generic over `CredentialValidator`, so any user store plugs in.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::IntoResponse;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use http::{Request, StatusCode};
use tower::{Layer, Service};

use crate::{AuthConfig, AuthError, CredentialValidator};

/// Tower `Layer` that wraps services with Basic authentication.
pub struct AuthLayer<V: CredentialValidator> {
    validator: Arc<V>,
    config: AuthConfig,
}

// `V` itself need not be `Clone`.
impl<V: CredentialValidator> Clone for AuthLayer<V> {
    fn clone(&self) -> Self {
        Self {
            validator: self.validator.clone(),
            config: self.config.clone(),
        }
    }
}

impl<V: CredentialValidator> AuthLayer<V> {
    /// Create a new auth layer with the given validator and config.
    pub fn new(validator: Arc<V>, config: AuthConfig) -> Self {
        Self { validator, config }
    }
}

impl<V: CredentialValidator, S> Layer<S> for AuthLayer<V> {
    type Service = AuthService<V, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            validator: self.validator.clone(),
            config: self.config.clone(),
        }
    }
}

/// Tower `Service` that validates credentials before forwarding requests.
///
/// On success, inserts `AuthenticatedUser` into request extensions where
/// it's available to downstream handlers.
pub struct AuthService<V: CredentialValidator, S> {
    inner: S,
    validator: Arc<V>,
    config: AuthConfig,
}

impl<V: CredentialValidator, S: Clone> Clone for AuthService<V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            validator: self.validator.clone(),
            config: self.config.clone(),
        }
    }
}

impl<V, S> Service<Request<Body>> for AuthService<V, S>
where
    V: CredentialValidator,
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = axum::response::Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let validator = self.validator.clone();
        let config = self.config.clone();

        Box::pin(async move {
            // Auth off: the request proceeds as anonymous.
            if !config.enabled {
                let resp = inner
                    .call(req)
                    .await
                    .unwrap_or_else(|infallible| match infallible {});
                return Ok(resp.into_response());
            }

            let (username, password) = match basic_credentials(&req) {
                Ok(credentials) => credentials,
                Err(auth_err) => {
                    log::debug!("Rejecting request: {auth_err}");
                    return Ok(unauthorized_response(&config.realm, &auth_err));
                }
            };

            match validator.validate(&username, &password).await {
                Ok(user) => {
                    log::debug!("Authenticated '{}'", user.username);
                    req.extensions_mut().insert(user);
                    let resp = inner
                        .call(req)
                        .await
                        .unwrap_or_else(|infallible| match infallible {});
                    Ok(resp.into_response())
                }
                Err(auth_err) if auth_err.is_client_error() => {
                    log::warn!("Authentication failed: {auth_err}");
                    Ok(unauthorized_response(&config.realm, &auth_err))
                }
                Err(auth_err) => {
                    log::error!("Authentication backend failed: {auth_err}");
                    Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, &auth_err))
                }
            }
        })
    }
}

/// Decode the Basic credentials of the Authorization header.
fn basic_credentials(req: &Request<Body>) -> Result<(String, String), AuthError> {
    let header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|e| AuthError::MalformedCredentials(e.to_string()))?;

    let (scheme, encoded) = header.split_once(' ').unwrap_or((header, ""));
    if !scheme.eq_ignore_ascii_case("Basic") {
        return Err(AuthError::UnsupportedScheme(scheme.to_string()));
    }

    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|e| AuthError::MalformedCredentials(e.to_string()))?;
    let decoded =
        String::from_utf8(decoded).map_err(|e| AuthError::MalformedCredentials(e.to_string()))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::MalformedCredentials("missing ':' separator".into()))?;
    if username.is_empty() {
        return Err(AuthError::MalformedCredentials("empty username".into()));
    }
    Ok((username.to_string(), password.to_string()))
}

fn error_response(status: StatusCode, err: &AuthError) -> axum::response::Response {
    let body = serde_json::json!({
        "error": {
            "category": "authentication",
            "message": err.to_string(),
        }
    });

    (
        status,
        [(http::header::CONTENT_TYPE, "application/json")],
        serde_json::to_string(&body).unwrap_or_default(),
    )
        .into_response()
}

/// Build a 401 Unauthorized response with a Basic challenge.
fn unauthorized_response(realm: &str, err: &AuthError) -> axum::response::Response {
    let mut response = error_response(StatusCode::UNAUTHORIZED, err);
    let challenge = format!(r#"Basic realm="{}""#, realm.replace('"', ""));
    if let Ok(value) = http::HeaderValue::from_str(&challenge) {
        response
            .headers_mut()
            .insert(http::header::WWW_AUTHENTICATE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthenticatedUser;
    use std::sync::Mutex;
    use tower::ServiceExt;

    // Accepts alice/secret, fails on "broken", rejects everything else.
    struct TestValidator;

    impl CredentialValidator for TestValidator {
        fn validate(
            &self,
            username: &str,
            password: &str,
        ) -> Pin<Box<dyn Future<Output = Result<AuthenticatedUser, AuthError>> + Send + '_>>
        {
            let username = username.to_string();
            let password = password.to_string();
            Box::pin(async move {
                match (username.as_str(), password.as_str()) {
                    ("alice", "secret") => Ok(AuthenticatedUser::new("alice")),
                    ("broken", _) => Err(AuthError::Backend("store offline".into())),
                    _ => Err(AuthError::InvalidCredentials(username)),
                }
            })
        }
    }

    fn enabled() -> AuthConfig {
        AuthConfig {
            enabled: true,
            realm: "Test Realm".to_string(),
        }
    }

    fn basic(username: &str, password: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
    }

    /// Mock inner service that captures the AuthenticatedUser.
    #[derive(Clone)]
    struct MockService {
        captured_user: Arc<Mutex<Option<AuthenticatedUser>>>,
    }

    impl MockService {
        fn new() -> Self {
            Self {
                captured_user: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl Service<Request<Body>> for MockService {
        type Response = axum::response::Response;
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Body>) -> Self::Future {
            let captured = self.captured_user.clone();
            Box::pin(async move {
                let user = req.extensions().get::<AuthenticatedUser>().cloned();
                *captured.lock().unwrap() = user;
                Ok((StatusCode::OK, "ok").into_response())
            })
        }
    }

    #[test]
    fn test_basic_credentials_valid() {
        let req = Request::builder()
            .header("Authorization", basic("alice", "pa:ss"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            basic_credentials(&req).unwrap(),
            ("alice".to_string(), "pa:ss".to_string())
        );
    }

    #[test]
    fn test_basic_credentials_missing() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert!(matches!(
            basic_credentials(&req),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[test]
    fn test_basic_credentials_wrong_scheme() {
        let req = Request::builder()
            .header("Authorization", "Bearer my-token-123")
            .body(Body::empty())
            .unwrap();
        assert!(matches!(
            basic_credentials(&req),
            Err(AuthError::UnsupportedScheme(ref s)) if s == "Bearer"
        ));
    }

    #[test]
    fn test_basic_credentials_garbage() {
        let req = Request::builder()
            .header("Authorization", "Basic !!!")
            .body(Body::empty())
            .unwrap();
        assert!(matches!(
            basic_credentials(&req),
            Err(AuthError::MalformedCredentials(_))
        ));
    }

    #[test]
    fn test_unauthorized_response_challenge() {
        let resp = unauthorized_response("Test Realm", &AuthError::MissingCredentials);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()[http::header::WWW_AUTHENTICATE],
            r#"Basic realm="Test Realm""#
        );
    }

    #[tokio::test]
    async fn test_middleware_disabled_passes_anonymous() {
        let mock = MockService::new();
        let captured = mock.captured_user.clone();
        let service = AuthLayer::new(Arc::new(TestValidator), AuthConfig::default()).layer(mock);

        let req = Request::builder()
            .header("Authorization", basic("alice", "secret"))
            .body(Body::empty())
            .unwrap();
        let resp = service.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(captured.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_middleware_missing_credentials_returns_401() {
        let service = AuthLayer::new(Arc::new(TestValidator), enabled()).layer(MockService::new());

        let req = Request::builder().body(Body::empty()).unwrap();
        let resp = service.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(http::header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_middleware_wrong_password_returns_401() {
        let service = AuthLayer::new(Arc::new(TestValidator), enabled()).layer(MockService::new());

        let req = Request::builder()
            .header("Authorization", basic("alice", "guess"))
            .body(Body::empty())
            .unwrap();
        let resp = service.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_middleware_backend_failure_returns_500() {
        let service = AuthLayer::new(Arc::new(TestValidator), enabled()).layer(MockService::new());

        let req = Request::builder()
            .header("Authorization", basic("broken", "x"))
            .body(Body::empty())
            .unwrap();
        let resp = service.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_middleware_valid_credentials_inject_user() {
        let mock = MockService::new();
        let captured = mock.captured_user.clone();
        let service = AuthLayer::new(Arc::new(TestValidator), enabled()).layer(mock);

        let req = Request::builder()
            .header("Authorization", basic("alice", "secret"))
            .body(Body::empty())
            .unwrap();
        let resp = service.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let user = captured.lock().unwrap();
        let user = user.as_ref().expect("AuthenticatedUser should be present");
        assert_eq!(user.username, "alice");
    }
}
