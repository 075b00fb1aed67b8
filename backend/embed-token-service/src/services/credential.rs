//! Azure AD client-credentials grant
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, error};

use super::{bounded_detail, CredentialAcquirer};
use crate::error::{EmbedError, Result};
use crate::models::{AccessToken, ServiceCredential};

/// Azure AD (Microsoft Entra ID) token endpoint client.
///
/// Every call performs a fresh exchange; nothing is cached between requests.
pub struct AzureAdCredentialAcquirer {
    http: Client,
    authority_host: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl AzureAdCredentialAcquirer {
    pub fn new(http: Client, authority_host: impl Into<String>) -> Self {
        Self {
            http,
            authority_host: authority_host.into(),
        }
    }

    fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            tenant_id
        )
    }
}

#[async_trait]
impl CredentialAcquirer for AzureAdCredentialAcquirer {
    async fn acquire(&self, credential: &ServiceCredential, scope: &str) -> Result<AccessToken> {
        if credential.tenant_id.is_empty() || credential.tenant_id.contains('/') {
            return Err(EmbedError::Auth(format!(
                "tenant id '{}' is not usable in the token endpoint",
                credential.tenant_id
            )));
        }

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.expose_secret()),
            ("scope", scope),
        ];

        let response = self
            .http
            .post(self.token_url(&credential.tenant_id))
            .form(&params)
            .send()
            .await
            .map_err(|e| EmbedError::Auth(format!("token endpoint request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = bounded_detail(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => format!(
                    "{}: {}",
                    err.error,
                    err.error_description.unwrap_or_default()
                ),
                Err(_) => body,
            });
            error!(status = %status, tenant_id = %credential.tenant_id, "Azure AD rejected client credentials");
            return Err(EmbedError::Auth(format!("{} - {}", status, detail)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Auth(format!("failed to parse token response: {}", e)))?;

        if token.access_token.is_empty() {
            return Err(EmbedError::Auth("token endpoint returned an empty access token".into()));
        }

        let expires_at = Duration::try_seconds(token.expires_in)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                EmbedError::Auth(format!(
                    "token endpoint returned out-of-range expires_in {}",
                    token.expires_in
                ))
            })?;
        debug!(expires_at = %expires_at, "Acquired Power BI access token");

        Ok(AccessToken::new(token.access_token, expires_at))
    }
}
