//! Embed token issuance pipeline
//!
//! Drives one request through
//! `ReceivedRequest -> Authenticated -> ReportResolved -> (Scoped) -> TokenIssued`,
//! or `Failed` from any of them.
//! Each outbound call runs under its own deadline and races the request's
//! cancellation token; the first failure ends the pipeline.
use reqwest::Client;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    is_placeholder_user_id, AzureAdCredentialAcquirer, CredentialAcquirer, IdentityScoper,
    PowerBiClient, ReportResolver, TokenExchanger,
};
use crate::config::Config;
use crate::error::{EmbedError, Result, MISSING_USER_ID_MESSAGE};
use crate::metrics;
use crate::models::{EmbedTokenResponse, ServiceCredential, TokenRequest};

/// States of a single issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    ReceivedRequest,
    Authenticated,
    ReportResolved,
    Scoped,
    TokenIssued,
    ResponseSent,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::ReceivedRequest => "received_request",
            PipelineStage::Authenticated => "authenticated",
            PipelineStage::ReportResolved => "report_resolved",
            PipelineStage::Scoped => "scoped",
            PipelineStage::TokenIssued => "token_issued",
            PipelineStage::ResponseSent => "response_sent",
            PipelineStage::Failed => "failed",
        }
    }

    /// `ResponseSent` and `Failed` end a request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::ResponseSent | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three outbound calls a request makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamCall {
    AcquireToken,
    ResolveReport,
    GenerateToken,
}

impl UpstreamCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamCall::AcquireToken => "acquire_token",
            UpstreamCall::ResolveReport => "resolve_report",
            UpstreamCall::GenerateToken => "generate_token",
        }
    }
}

impl fmt::Display for UpstreamCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrates credential acquisition, report resolution, identity scoping
/// and token exchange for one embed token request.
pub struct EmbedTokenService {
    credential: ServiceCredential,
    scope: String,
    workspace_id: String,
    report_id: String,
    require_user_id: bool,
    token_lifetime_minutes: Option<u32>,
    upstream_timeout: Duration,
    scoper: IdentityScoper,
    acquirer: Arc<dyn CredentialAcquirer>,
    resolver: Arc<dyn ReportResolver>,
    exchanger: Arc<dyn TokenExchanger>,
}

impl EmbedTokenService {
    pub fn new(
        config: &Config,
        acquirer: Arc<dyn CredentialAcquirer>,
        resolver: Arc<dyn ReportResolver>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Self {
        Self {
            credential: config.service_credential(),
            scope: config.powerbi.scope.clone(),
            workspace_id: config.powerbi.workspace_id.clone(),
            report_id: config.powerbi.report_id.clone(),
            require_user_id: config.embed.require_user_id,
            token_lifetime_minutes: config.embed.token_lifetime_minutes,
            upstream_timeout: config.server.upstream_timeout(),
            scoper: IdentityScoper::new(config.embed.rls_roles()),
            acquirer,
            resolver,
            exchanger,
        }
    }

    /// Wires the Azure AD and Power BI clients around one shared HTTP client.
    pub fn from_config(config: &Config, http: Client) -> Self {
        let powerbi = Arc::new(PowerBiClient::new(
            http.clone(),
            config.powerbi.api_base_url.clone(),
        ));
        let acquirer = Arc::new(AzureAdCredentialAcquirer::new(
            http,
            config.powerbi.authority_host.clone(),
        ));

        Self::new(config, acquirer, powerbi.clone(), powerbi)
    }

    pub fn requires_user_id(&self) -> bool {
        self.require_user_id
    }

    /// Runs the pipeline. Failures are logged here with full detail; callers
    /// only see the error kind through its HTTP mapping.
    pub async fn issue(
        &self,
        user_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<EmbedTokenResponse> {
        let mut stage = PipelineStage::ReceivedRequest;
        let outcome = self.run(user_id, cancel, &mut stage).await;

        match &outcome {
            Ok(response) => {
                metrics::record_outcome("success");
                info!(report_id = %response.report_id, "Issued embed token");
            }
            Err(err @ EmbedError::Validation(_)) => {
                metrics::record_outcome(err.kind());
                warn!(error = %err, "Rejected embed token request");
                advance(&mut stage, PipelineStage::Failed);
            }
            Err(err) => {
                metrics::record_outcome(err.kind());
                error!(
                    failed_after = %stage,
                    kind = err.kind(),
                    error = %err,
                    "Failed to generate Power BI embed token"
                );
                advance(&mut stage, PipelineStage::Failed);
            }
        }

        outcome
    }

    async fn run(
        &self,
        user_id: Option<&str>,
        cancel: &CancellationToken,
        stage: &mut PipelineStage,
    ) -> Result<EmbedTokenResponse> {
        if self.require_user_id && is_placeholder_user_id(user_id) {
            return Err(EmbedError::Validation(MISSING_USER_ID_MESSAGE.to_string()));
        }

        let access_token = self
            .call(
                UpstreamCall::AcquireToken,
                cancel,
                || self.acquirer.acquire(&self.credential, &self.scope),
            )
            .await?;
        advance(stage, PipelineStage::Authenticated);

        let report = self
            .call(
                UpstreamCall::ResolveReport,
                cancel,
                || {
                    self.resolver
                        .resolve_report(&access_token, &self.workspace_id, &self.report_id)
                },
            )
            .await?;
        advance(stage, PipelineStage::ReportResolved);

        let identity = self.scoper.scope(user_id, &report);
        if identity.is_scoped() {
            advance(stage, PipelineStage::Scoped);
        }

        let request =
            TokenRequest::for_report(&report, identity).with_lifetime(self.token_lifetime_minutes);
        let token = self
            .call(
                UpstreamCall::GenerateToken,
                cancel,
                || self.exchanger.generate_token(&access_token, &request),
            )
            .await?;
        advance(stage, PipelineStage::TokenIssued);

        Ok(EmbedTokenResponse::assemble(report, token))
    }

    async fn call<T, F, Fut>(
        &self,
        call: UpstreamCall,
        cancel: &CancellationToken,
        start: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if cancel.is_cancelled() {
            return Err(EmbedError::Cancelled(call));
        }

        let _timer = metrics::upstream_timer(call.as_str());
        let fut = start();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EmbedError::Cancelled(call)),
            result = tokio::time::timeout(self.upstream_timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(EmbedError::Timeout {
                    call,
                    after: self.upstream_timeout,
                }),
            },
        }
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    debug!(
        from = %stage,
        to = %next,
        terminal = next.is_terminal(),
        "Pipeline transition"
    );
    *stage = next;
}
