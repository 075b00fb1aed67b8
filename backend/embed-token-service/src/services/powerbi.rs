//! Power BI REST API integration: report lookup and embed token generation
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{bounded_detail, ReportResolver, TokenExchanger};
use crate::error::{EmbedError, Result};
use crate::models::{AccessToken, EmbedTokenResult, Identity, ReportDescriptor, TokenRequest};

/// Power BI REST client.
///
/// Holds no per-request state; the bearer token is attached to each call,
/// so one instance is shared by all concurrent requests.
pub struct PowerBiClient {
    http: Client,
    api_base_url: String,
}

// ============================================
// Request types
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateTokenBody {
    datasets: Vec<ResourceRef>,
    reports: Vec<ResourceRef>,
    target_workspaces: Vec<ResourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identities: Option<Vec<EffectiveIdentity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lifetime_in_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ResourceRef {
    id: String,
}

#[derive(Debug, Serialize)]
struct EffectiveIdentity {
    username: String,
    roles: Vec<String>,
    datasets: Vec<String>,
}

impl From<&TokenRequest> for GenerateTokenBody {
    fn from(request: &TokenRequest) -> Self {
        let identities = match &request.identity {
            Identity::None => None,
            Identity::Scoped(rls) => Some(vec![EffectiveIdentity {
                username: rls.username.clone(),
                roles: rls.roles.iter().cloned().collect(),
                datasets: rls.datasets.iter().cloned().collect(),
            }]),
        };

        Self {
            datasets: vec![ResourceRef {
                id: request.dataset_id.clone(),
            }],
            reports: vec![ResourceRef {
                id: request.report_id.to_string(),
            }],
            target_workspaces: vec![ResourceRef {
                id: request.workspace_id.to_string(),
            }],
            identities,
            lifetime_in_minutes: request.lifetime_in_minutes,
        }
    }
}

// ============================================
// Response types
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportResponse {
    id: Uuid,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    embed_url: Option<String>,
    #[serde(default)]
    dataset_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateTokenResponse {
    token: String,
    #[serde(default)]
    token_id: Option<String>,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

impl PowerBiClient {
    pub fn new(http: Client, api_base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn report_url(&self, workspace_id: Uuid, report_id: Uuid) -> String {
        format!(
            "{}/v1.0/myorg/groups/{}/reports/{}",
            self.api_base_url, workspace_id, report_id
        )
    }

    fn generate_token_url(&self) -> String {
        format!("{}/v1.0/myorg/GenerateToken", self.api_base_url)
    }
}

fn parse_guid(name: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim()).map_err(|_| {
        EmbedError::InvalidConfiguration(format!("{} id '{}' is not a valid GUID", name, value))
    })
}

/// Status line plus a bounded slice of the upstream body, for server-side logs.
async fn error_detail(response: Response) -> String {
    let status = response.status();
    let request_id = response
        .headers()
        .get("RequestId")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = bounded_detail(response.text().await.unwrap_or_default());

    match request_id {
        Some(id) => format!("{} (RequestId {}): {}", status, id, body),
        None => format!("{}: {}", status, body),
    }
}

#[async_trait]
impl ReportResolver for PowerBiClient {
    async fn resolve_report(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        report_id: &str,
    ) -> Result<ReportDescriptor> {
        let workspace_id = parse_guid("workspace", workspace_id)?;
        let report_id = parse_guid("report", report_id)?;

        let response = self
            .http
            .get(self.report_url(workspace_id, report_id))
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| EmbedError::Upstream(format!("report lookup request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                let detail = error_detail(response).await;
                error!(%workspace_id, %report_id, "Report not found in workspace");
                return Err(EmbedError::ReportNotFound(format!(
                    "report {} in workspace {}: {}",
                    report_id, workspace_id, detail
                )));
            }
            _ => {
                let detail = error_detail(response).await;
                error!(%workspace_id, %report_id, "Report lookup failed");
                return Err(EmbedError::Upstream(detail));
            }
        }

        let report: ReportResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Upstream(format!("failed to parse report response: {}", e)))?;

        let dataset_id = report
            .dataset_id
            .filter(|d| !d.is_empty())
            .ok_or_else(|| EmbedError::Upstream(format!("report {} has no dataset", report.id)))?;
        let embed_url = report
            .embed_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| EmbedError::Upstream(format!("report {} has no embed URL", report.id)))?;

        debug!(
            report_id = %report.id,
            report_name = report.name.as_deref().unwrap_or_default(),
            dataset_id = %dataset_id,
            "Resolved report"
        );

        Ok(ReportDescriptor {
            report_id: report.id,
            dataset_id,
            embed_url,
            workspace_id,
        })
    }
}

#[async_trait]
impl TokenExchanger for PowerBiClient {
    async fn generate_token(
        &self,
        token: &AccessToken,
        request: &TokenRequest,
    ) -> Result<EmbedTokenResult> {
        let body = GenerateTokenBody::from(request);

        let response = self
            .http
            .post(self.generate_token_url())
            .bearer_auth(token.secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                EmbedError::TokenGeneration(format!("GenerateToken request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            error!(report_id = %request.report_id, "Power BI refused to generate embed token");
            return Err(EmbedError::TokenGeneration(detail));
        }

        let generated: GenerateTokenResponse = response.json().await.map_err(|e| {
            EmbedError::TokenGeneration(format!("failed to parse GenerateToken response: {}", e))
        })?;

        if generated.token.is_empty() {
            return Err(EmbedError::TokenGeneration(
                "GenerateToken returned an empty token".into(),
            ));
        }

        info!(
            report_id = %request.report_id,
            token_id = generated.token_id.as_deref().unwrap_or_default(),
            rls = request.identity.is_scoped(),
            "Generated embed token"
        );

        Ok(EmbedTokenResult {
            token: generated.token,
            token_id: generated.token_id,
            expiration: generated.expiration,
        })
    }
}
