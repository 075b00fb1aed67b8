use actix_cors::Cors;
use actix_web::{middleware::Condition, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use embed_token_service::config::Config;
use embed_token_service::handlers::{self, EmbedHandlerState};
use embed_token_service::services::EmbedTokenService;
use embed_token_service::telemetry::init_tracing;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration from environment")?;
    init_tracing(config.server.log_format);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Starting embed-token-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        workspace_id = %config.powerbi.workspace_id,
        report_id = %config.powerbi.report_id,
        require_user_id = config.embed.require_user_id,
        "Power BI target configured"
    );

    let http = reqwest::Client::builder()
        .timeout(config.server.upstream_timeout())
        .build()
        .context("Failed to create HTTP client")?;

    let service = Arc::new(EmbedTokenService::from_config(&config, http));
    let shutdown = CancellationToken::new();
    let state = web::Data::new(EmbedHandlerState::new(service, shutdown.clone()));

    let cors_origins = config.server.cors_origins();
    let bind_addr = (config.server.host.clone(), config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Condition::new(!cors_origins.is_empty(), build_cors(&cors_origins)))
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .disable_signals()
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}:{}", bind_addr.0, bind_addr.1))?
    .run();

    tracing::info!("HTTP server listening on {}:{}", bind_addr.0, bind_addr.1);

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, cancelling in-flight requests");
        shutdown.cancel();
        handle.stop(true).await;
    });

    server.await.context("HTTP server failed")?;
    Ok(())
}

fn build_cors(origins: &[String]) -> Cors {
    let mut cors = Cors::default();
    for origin in origins {
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else {
            cors = cors.allowed_origin(origin);
        }
    }
    cors.allowed_methods(vec!["GET"]).allow_any_header().max_age(3600)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
