pub mod embed;

use actix_web::{web, HttpResponse};

use crate::metrics::metrics_handler;

pub use embed::{get_embed_token, EmbedHandlerState, EmbedTokenQuery};

/// Registers every route the service exposes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_embed_token)
        .route("/health", web::get().to(|| async { HttpResponse::Ok().body("OK") }))
        .route("/metrics", web::get().to(metrics_handler));
}
