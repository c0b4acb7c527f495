//! # Configuration Module
//!
//! Process-wide configuration for the bridge, constructed once at startup and
//! passed explicitly into each component. Business logic never reads ambient
//! environment state.
//!
//! All fields carry serde defaults so an absent file or an entirely
//! unconfigured environment still deserializes; [`BridgeConfig::validate`]
//! then decides whether the result is actually usable. Secret values that are
//! unresolved external-secret placeholders (a Key Vault reference the host
//! failed to substitute) are treated as missing.

use serde::{Deserialize, Serialize};
use url::Url;

/// Prefix that an unresolved Key Vault reference carries when the hosting
/// platform failed to substitute the secret.
const UNRESOLVED_SECRET_PREFIX: &str = "@Microsoft.KeyVault(";

/// Check whether a configured value is usable: present and not an unresolved
/// external-secret placeholder.
fn is_usable(value: &str) -> bool {
    !value.trim().is_empty() && !value.starts_with(UNRESOLVED_SECRET_PREFIX)
}

// ============================================================================
// Configuration Sections
// ============================================================================

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Workflow dispatch target
    pub github: GithubConfig,

    /// Work-item read API
    pub ado: AdoConfig,

    /// Dispatch policy rule values
    pub policy: PolicyConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path of the Service Hook endpoint
    pub endpoint_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            endpoint_path: "/hooks/work-item".to_string(),
        }
    }
}

/// Workflow dispatch target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Workflow file to dispatch
    pub workflow_filename: String,

    /// Git ref (branch or tag) to dispatch on
    pub workflow_ref: String,

    /// Token with workflow-dispatch permission
    pub dispatch_token: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            workflow_filename: "spec-kit-specify.yml".to_string(),
            workflow_ref: "main".to_string(),
            dispatch_token: String::new(),
        }
    }
}

impl GithubConfig {
    /// Names of required dispatch fields that are missing or unusable.
    ///
    /// Checked before any dispatch attempt; a non-empty result means the
    /// dispatch must fail with a configuration error without touching the
    /// network.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        require(&mut missing, "github.owner", &self.owner);
        require(&mut missing, "github.repo", &self.repo);
        require(&mut missing, "github.dispatch_token", &self.dispatch_token);
        missing
    }
}

/// Work-item read API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdoConfig {
    /// Organization URL, e.g. `https://dev.azure.com/my-org`
    pub org_url: String,

    /// Project name
    pub project: String,

    /// Personal access token with work-item read scope (read and write for
    /// the issue-filing tooling)
    pub pat: String,
}

impl AdoConfig {
    /// Names of required work-item API fields that are missing or unusable
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        require(&mut missing, "ado.org_url", &self.org_url);
        require(&mut missing, "ado.project", &self.project);
        require(&mut missing, "ado.pat", &self.pat);
        missing
    }
}

/// Dispatch policy rule values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Service Hook event type that triggers dispatch
    pub trigger_event_type: String,

    /// Work-item type eligible for dispatch
    pub work_item_type: String,

    /// Assignee display name to match (case-insensitive)
    pub assignee_match: String,

    /// Board column the item must occupy, optionally with a sub-state suffix
    pub column_name: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            trigger_event_type: "workitem.updated".to_string(),
            work_item_type: "Feature".to_string(),
            assignee_match: "AI Teammate".to_string(),
            column_name: "Specification \u{2013} Doing".to_string(),
        }
    }
}

fn require(missing: &mut Vec<String>, key: &str, value: &str) {
    if !is_usable(value) {
        missing.push(key.to_string());
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {}", keys.join(", "))]
    Missing { keys: Vec<String> },

    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl BridgeConfig {
    /// Validate that the configuration is complete enough to serve requests.
    ///
    /// Missing required keys produce one [`ConfigError::Missing`] listing
    /// every absent key, so an operator can fix them all in one pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut keys = self.github.missing_fields();
        keys.extend(self.ado.missing_fields());

        if !keys.is_empty() {
            return Err(ConfigError::Missing { keys });
        }

        Url::parse(&self.ado.org_url).map_err(|e| ConfigError::Invalid {
            key: "ado.org_url".to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
