//! Auth-specific error types.

/// Errors that can occur during authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No Authorization header present.
    #[error("missing credentials")]
    MissingCredentials,

    /// The Authorization header uses a scheme other than Basic.
    #[error("unsupported authorization scheme: {0}")]
    UnsupportedScheme(String),

    /// The Basic credentials could not be decoded.
    #[error("malformed credentials: {0}")]
    MalformedCredentials(String),

    /// Username or password rejected.
    #[error("invalid credentials for '{0}'")]
    InvalidCredentials(String),

    /// The credential store could not be consulted.
    #[error("credential backend error: {0}")]
    Backend(String),
}

impl AuthError {
    /// Whether this error should result in a 401 (vs. a 500).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AuthError::Backend(_))
    }
}
