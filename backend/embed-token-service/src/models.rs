//! Domain types flowing through the embed token pipeline
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Service principal credentials used for the client-credentials grant.
///
/// `SecretString` keeps the client secret out of `Debug` output.
#[derive(Debug, Clone)]
pub struct ServiceCredential {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Bearer token for the Power BI REST API, scoped to a single request.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Report metadata resolved from the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDescriptor {
    pub report_id: Uuid,
    pub dataset_id: String,
    pub embed_url: String,
    pub workspace_id: Uuid,
}

/// Effective identity for row-level security.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlsIdentity {
    pub username: String,
    pub roles: BTreeSet<String>,
    pub datasets: BTreeSet<String>,
}

/// Whether the embed token is scoped to a user.
///
/// `None` omits the identity from the token request entirely, which Power BI
/// treats as unrestricted viewer access. A scoped identity with zero roles
/// would instead deny all rows, so the two are never conflated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    None,
    Scoped(RlsIdentity),
}

impl Identity {
    pub fn is_scoped(&self) -> bool {
        matches!(self, Identity::Scoped(_))
    }
}

/// Everything the token exchanger submits upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub report_id: Uuid,
    pub dataset_id: String,
    pub workspace_id: Uuid,
    pub identity: Identity,
    pub lifetime_in_minutes: Option<u32>,
}

impl TokenRequest {
    /// Builds the request from a resolved report, so report, dataset and
    /// workspace always come from the same lookup.
    pub fn for_report(report: &ReportDescriptor, identity: Identity) -> Self {
        Self {
            report_id: report.report_id,
            dataset_id: report.dataset_id.clone(),
            workspace_id: report.workspace_id,
            identity,
            lifetime_in_minutes: None,
        }
    }

    pub fn with_lifetime(mut self, minutes: Option<u32>) -> Self {
        self.lifetime_in_minutes = minutes;
        self
    }
}

/// Embed token returned by `GenerateToken`.
#[derive(Clone)]
pub struct EmbedTokenResult {
    pub token: String,
    pub token_id: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for EmbedTokenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedTokenResult")
            .field("token", &"[REDACTED]")
            .field("token_id", &self.token_id)
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Payload handed to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedTokenResponse {
    pub report_id: String,
    pub embed_url: String,
    pub embed_token: String,
}

impl EmbedTokenResponse {
    pub fn assemble(report: ReportDescriptor, token: EmbedTokenResult) -> Self {
        Self {
            report_id: report.report_id.to_string(),
            embed_url: report.embed_url,
            embed_token: token.token,
        }
    }
}
