//! Engine configuration.
//!
//! [`AclConfig`] is loaded from TOML. Resolution order for the file:
//!
//! 1. An explicit path passed to [`AclConfig::load`]
//! 2. The `DAVACL_CONFIG` environment variable
//! 3. Built-in defaults (no file)
//!
//! # Example
//!
//! ```
//! use davacl_core::AclConfig;
//!
//! let config = AclConfig::from_toml_str(r#"
//!     admin_principals = ["/principals/admin/"]
//!     allow_access_to_nodes_without_acl = false
//! "#).unwrap();
//!
//! assert_eq!(config.admin_principals, vec!["principals/admin".to_string()]);
//! assert_eq!(config.default_principal_prefix, "principals");
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::util::uri::normalize_path;
use crate::{Error, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "DAVACL_CONFIG";

/// Access-control engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Principals granted the universal privilege on every ACL-capable
    /// resource.
    pub admin_principals: Vec<String>,

    /// Prefix under which usernames map to principal paths.
    pub default_principal_prefix: String,

    /// Grant access to resources that do not support ACLs.
    pub allow_access_to_nodes_without_acl: bool,

    /// Drop children the caller may not read from listings.
    pub hide_nodes_by_acl: bool,

    /// Roots of the principal collections.
    pub principal_collection_set: Vec<String>,

    /// Server base URI, stripped from client-submitted principal hrefs.
    pub base_uri: String,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            admin_principals: Vec::new(),
            default_principal_prefix: "principals".to_string(),
            allow_access_to_nodes_without_acl: true,
            hide_nodes_by_acl: false,
            principal_collection_set: vec!["principals".to_string()],
            base_uri: "/".to_string(),
        }
    }
}

impl AclConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AclConfig =
            toml::from_str(content).map_err(|e| Error::config(format!("Invalid TOML: {e}")))?;
        config.validate()
    }

    /// Loads configuration from `path`, the environment, or defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = Self::resolve_config_path(path) else {
            log::debug!("No davacl config file given; using defaults");
            return Self::default().validate();
        };

        log::info!("Loading davacl config from {}", path.display());
        Self::load_file(&path)
    }

    /// Loads and validates one file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Resolves which file [`AclConfig::load`] would read.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        explicit
            .map(PathBuf::from)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
    }

    /// Checks invariants and normalizes every configured path.
    pub fn validate(mut self) -> Result<Self> {
        self.default_principal_prefix = normalize_path(&self.default_principal_prefix);
        if self.default_principal_prefix.is_empty() {
            return Err(Error::config("default_principal_prefix must not be empty"));
        }

        self.admin_principals = self
            .admin_principals
            .iter()
            .map(|p| normalize_path(p))
            .filter(|p| !p.is_empty())
            .collect();
        self.principal_collection_set = self
            .principal_collection_set
            .iter()
            .map(|p| normalize_path(p))
            .collect();

        if !self.base_uri.starts_with('/') {
            self.base_uri = format!("/{}", self.base_uri);
        }
        Ok(self)
    }

    /// Maps an authenticated username to its principal path.
    pub fn principal_for_username(&self, username: &str) -> String {
        format!("{}/{}", self.default_principal_prefix, normalize_path(username))
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }
}
