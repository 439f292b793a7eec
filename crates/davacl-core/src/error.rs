//! Error types for davacl-core

use std::path::Path;
use thiserror::Error;

/// Result type alias for davacl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while evaluating or mutating access control.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The caller lacks one or more privileges on `uri`.
    #[error("Need privileges on {uri}: {}", privileges.join(", "))]
    NeedPrivileges {
        /// Resource the check was made against.
        uri: String,
        /// Exactly the privileges that were missing.
        privileges: Vec<String>,
    },

    /// The ACL method was sent to a resource without ACL support.
    #[error("Method not allowed: {0} does not support ACLs")]
    MethodNotAllowed(String),

    /// A mutation would drop or alter a protected ACE.
    #[error("ACE conflict: protected entry {principal} / {privilege} must be preserved")]
    AceConflict {
        /// Principal of the protected entry.
        principal: String,
        /// Privilege of the protected entry.
        privilege: String,
    },

    /// A mutation named a privilege the resource does not support.
    #[error("Privilege not supported: {0}")]
    NotSupportedPrivilege(String),

    /// A mutation tried to grant an abstract privilege.
    #[error("Privilege {0} is abstract and cannot be granted")]
    NoAbstractPrivilege(String),

    /// A referenced principal does not exist or is not a principal.
    #[error("Principal not recognized: {0}")]
    NotRecognizedPrincipal(String),

    /// Malformed mutation or report request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource or principal lookup failed.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was being looked up.
        kind: String,
        /// The identifier that could not be resolved.
        id: String,
    },

    /// The operation is never allowed on this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A privilege tree declared the same name twice.
    #[error("Duplicate privilege in supported privilege set: {0}")]
    DuplicatePrivilege(String),

    /// A privilege tree nests deeper than the engine traverses.
    #[error("Privilege tree deeper than {max} levels at {name}")]
    PrivilegeTreeTooDeep {
        /// Privilege found past the depth limit.
        name: String,
        /// The configured depth limit.
        max: usize,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// I/O error with the path that caused it.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being read or written.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A storage or directory collaborator failed.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Coarse outcome class of an [`Error`], independent of any transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Access refused.
    Forbidden,
    /// Request conflicts with current resource state.
    Conflict,
    /// Request is malformed.
    BadRequest,
    /// Target does not exist.
    NotFound,
    /// Method is not supported by the target.
    MethodNotAllowed,
    /// Server-side failure.
    Internal,
}

impl Error {
    /// Creates a not-found error.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a privilege-check failure.
    pub fn need_privileges(uri: impl Into<String>, privileges: Vec<String>) -> Self {
        Error::NeedPrivileges {
            uri: uri.into(),
            privileges,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Wraps an I/O error with the path it occurred at.
    pub fn io_with_path(source: std::io::Error, path: &Path) -> Self {
        Error::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Creates a collaborator failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend(message.into())
    }

    /// Returns `true` for lookup failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// The outcome class a transport should report for this error.
    pub fn classification(&self) -> Classification {
        match self {
            Error::NeedPrivileges { .. }
            | Error::NotSupportedPrivilege(_)
            | Error::NoAbstractPrivilege(_)
            | Error::NotRecognizedPrincipal(_)
            | Error::Forbidden(_) => Classification::Forbidden,
            Error::AceConflict { .. } => Classification::Conflict,
            Error::BadRequest(_) => Classification::BadRequest,
            Error::NotFound { .. } => Classification::NotFound,
            Error::MethodNotAllowed(_) => Classification::MethodNotAllowed,
            Error::DuplicatePrivilege(_)
            | Error::PrivilegeTreeTooDeep { .. }
            | Error::Config { .. }
            | Error::Io { .. }
            | Error::Backend(_) => Classification::Internal,
        }
    }
}
