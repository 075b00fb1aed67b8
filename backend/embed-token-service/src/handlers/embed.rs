use actix_web::{get, web, HttpRequest, HttpResponse};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EmbedError;
use crate::services::{is_placeholder_user_id, EmbedTokenService, PipelineStage};

const USER_ID_PARAM: &str = "userId";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct EmbedTokenQuery {
    pub user_id: Option<String>,
}

impl EmbedTokenQuery {
    /// Reads `userId` from a raw query string. The first occurrence wins when
    /// the parameter is repeated; other parameters are ignored.
    pub fn from_query_string(query: &str) -> Self {
        match web::Query::<Vec<(String, String)>>::from_query(query) {
            Ok(pairs) => Self {
                user_id: pairs
                    .into_inner()
                    .into_iter()
                    .find(|(key, _)| key == USER_ID_PARAM)
                    .map(|(_, value)| value),
            },
            Err(err) => {
                warn!(error = %err, "Ignoring unparsable query string");
                Self::default()
            }
        }
    }

    /// Whether the pipeline will build a row-level security identity.
    pub fn rls_requested(&self) -> bool {
        !is_placeholder_user_id(self.user_id.as_deref())
    }
}

pub struct EmbedHandlerState {
    pub service: Arc<EmbedTokenService>,
    /// Cancelled on shutdown; each request runs under a child token.
    pub shutdown: CancellationToken,
}

impl EmbedHandlerState {
    pub fn new(service: Arc<EmbedTokenService>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }
}

/// GET /api/GetEmbedToken?userId=<optional>
#[get("/api/GetEmbedToken")]
pub async fn get_embed_token(
    req: HttpRequest,
    state: web::Data<EmbedHandlerState>,
) -> Result<HttpResponse, EmbedError> {
    let query = EmbedTokenQuery::from_query_string(req.query_string());
    info!(
        rls_requested = query.rls_requested(),
        "Processing request for Power BI embed token"
    );

    // Dropping the handler (client disconnect) cancels the pipeline too.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let payload = state
        .service
        .issue(query.user_id.as_deref(), &cancel)
        .await?;

    let response = HttpResponse::Ok().json(payload);
    debug!(
        from = %PipelineStage::TokenIssued,
        to = %PipelineStage::ResponseSent,
        "Pipeline transition"
    );
    Ok(response)
}
