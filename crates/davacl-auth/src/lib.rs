//! HTTP Basic authentication for davacl.
//!
//! Provides:
//! - [`AuthenticatedUser`]: identity extracted from validated credentials
//! - [`CredentialValidator`]: trait for async credential checks (implement per user store)
//! - [`AuthLayer`] / [`AuthService`]: Tower middleware parameterised over `CredentialValidator`
//! - [`AuthConfig`]: configuration for the auth layer
//! - [`AuthError`]: auth-specific error types

mod error;
mod middleware;
mod user;

pub use error::AuthError;
pub use middleware::{AuthLayer, AuthService};
pub use user::{user_from_parts, username_from_parts, AuthenticatedUser};

/// Default realm announced in `WWW-Authenticate`.
pub const DEFAULT_REALM: &str = "davacl";

/// Configuration for the auth middleware.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Whether authentication is enabled. When false, every request passes
    /// through as anonymous.
    pub enabled: bool,
    /// Realm announced in the Basic challenge.
    pub realm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            realm: DEFAULT_REALM.to_string(),
        }
    }
}

/// Trait for checking a username and password.
///
/// The middleware calls `validate()` with the decoded Basic credentials and
/// forwards the request with the returned user on success.
pub trait CredentialValidator: Send + Sync + 'static {
    /// Validate credentials and return the authenticated user.
    fn validate(
        &self,
        username: &str,
        password: &str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<AuthenticatedUser, AuthError>> + Send + '_>,
    >;
}
