use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AccessToken, EmbedTokenResult, ReportDescriptor, ServiceCredential, TokenRequest};

pub mod credential;
pub mod identity;
pub mod pipeline;
pub mod powerbi;

pub use credential::AzureAdCredentialAcquirer;
pub use identity::{is_placeholder_user_id, IdentityScoper};
pub use pipeline::{EmbedTokenService, PipelineStage, UpstreamCall};
pub use powerbi::PowerBiClient;

/// Exchanges service principal credentials for an API access token.
#[async_trait]
pub trait CredentialAcquirer: Send + Sync {
    async fn acquire(&self, credential: &ServiceCredential, scope: &str) -> Result<AccessToken>;
}

/// Looks up report metadata inside a workspace.
#[async_trait]
pub trait ReportResolver: Send + Sync {
    async fn resolve_report(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        report_id: &str,
    ) -> Result<ReportDescriptor>;
}

/// Trades a token request for an embed token.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn generate_token(
        &self,
        token: &AccessToken,
        request: &TokenRequest,
    ) -> Result<EmbedTokenResult>;
}

/// Longest slice of an upstream error body kept for server-side logs.
pub(crate) const MAX_ERROR_DETAIL: usize = 512;

/// Truncates `body` to at most `MAX_ERROR_DETAIL` bytes on a char boundary.
pub(crate) fn bounded_detail(mut body: String) -> String {
    if body.len() > MAX_ERROR_DETAIL {
        let mut end = MAX_ERROR_DETAIL;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
