//! Configuration for the embed token service
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ServiceCredential;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Main configuration struct, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub powerbi: PowerBiConfig,
    pub embed: EmbedConfig,
    pub server: ServerConfig,
}

/// Service principal and Power BI target, read from `POWERBI_*`
#[derive(Debug, Clone, Deserialize)]
pub struct PowerBiConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub workspace_id: String,
    pub report_id: String,

    /// Azure AD authority host
    #[serde(default = "default_authority_host")]
    pub authority_host: String,

    /// Power BI REST API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// OAuth2 scope requested for the Power BI API audience
    #[serde(default = "default_scope")]
    pub scope: String,
}

/// Embed token policy, read from `EMBED_*`
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedConfig {
    /// Reject requests without a usable `userId` (RLS-mandatory deployments)
    #[serde(default)]
    pub require_user_id: bool,

    /// Roles assigned to every RLS identity
    #[serde(default = "default_rls_roles")]
    pub rls_roles: Vec<String>,

    /// Requested embed token lifetime; Power BI default when unset
    #[serde(default)]
    pub token_lifetime_minutes: Option<u32>,
}

/// HTTP server settings, read from `SERVER_*`
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Deadline applied to each outbound call
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Comma-separated origins; empty disables CORS
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_api_base_url() -> String {
    "https://api.powerbi.com".to_string()
}

fn default_scope() -> String {
    "https://analysis.windows.net/powerbi/api/.default".to_string()
}

fn default_rls_roles() -> Vec<String> {
    vec!["UserRole".to_string()]
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7071
}

fn default_upstream_timeout() -> u64 {
    30
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            require_user_id: false,
            rls_roles: default_rls_roles(),
            token_lifetime_minutes: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream_timeout_secs: default_upstream_timeout(),
            cors_allowed_origins: Vec::new(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            powerbi: envy::prefixed("POWERBI_").from_env()?,
            embed: envy::prefixed("EMBED_").from_env()?,
            server: envy::prefixed("SERVER_").from_env()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("POWERBI_TENANT_ID", self.powerbi.tenant_id.as_str()),
            ("POWERBI_CLIENT_ID", self.powerbi.client_id.as_str()),
            ("POWERBI_CLIENT_SECRET", self.powerbi.client_secret.expose_secret()),
            ("POWERBI_WORKSPACE_ID", self.powerbi.workspace_id.as_str()),
            ("POWERBI_REPORT_ID", self.powerbi.report_id.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }

        let guids = [
            ("POWERBI_WORKSPACE_ID", self.powerbi.workspace_id.as_str()),
            ("POWERBI_REPORT_ID", self.powerbi.report_id.as_str()),
        ];
        for (name, value) in guids {
            if Uuid::parse_str(value.trim()).is_err() {
                return Err(ConfigError::Invalid {
                    name,
                    reason: format!("'{}' is not a valid GUID", value),
                });
            }
        }

        if self.embed.rls_roles().is_empty() {
            return Err(ConfigError::Invalid {
                name: "EMBED_RLS_ROLES",
                reason: "at least one role is required".to_string(),
            });
        }

        if self.server.upstream_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SERVER_UPSTREAM_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn service_credential(&self) -> ServiceCredential {
        ServiceCredential {
            tenant_id: self.powerbi.tenant_id.trim().to_string(),
            client_id: self.powerbi.client_id.trim().to_string(),
            client_secret: self.powerbi.client_secret.clone(),
        }
    }
}

impl EmbedConfig {
    /// Configured roles with blanks removed
    pub fn rls_roles(&self) -> Vec<String> {
        self.rls_roles
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl ServerConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}
