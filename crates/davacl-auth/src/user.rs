//! Authenticated user identity and extraction helpers.

/// An authenticated user, stored in HTTP request extensions by the auth
/// middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Login name; the engine maps it to a principal path.
    pub username: String,
}

impl AuthenticatedUser {
    /// Creates a user.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Extract the `AuthenticatedUser` from HTTP request `Parts`, if present.
pub fn user_from_parts(parts: &http::request::Parts) -> Option<&AuthenticatedUser> {
    parts.extensions.get::<AuthenticatedUser>()
}

/// The username of the request, or `None` for anonymous requests.
pub fn username_from_parts(parts: &http::request::Parts) -> Option<&str> {
    user_from_parts(parts).map(|u| u.username.as_str())
}
