use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farmview_api::commentary::openai::OpenAiClient;
use farmview_api::commentary::prompts::PromptSet;
use farmview_api::commentary::CommentaryEngine;
use farmview_api::config::ServerConfig;
use farmview_api::router::build_app_router;
use farmview_api::state::AppState;
use farmview_deadline::{DeadlineApi, DeadlineFarm, FarmSource};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farmview_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Deadline ---
    let api = DeadlineApi::new(config.web_service_url.clone());
    let farm = DeadlineFarm::new(api);

    // A cold cache is not fatal; the first client request refills it.
    if let Err(e) = farm.prewarm().await {
        tracing::warn!(error = %e, "Job list prefetch failed, continuing with a cold cache");
    }
    let farm: Arc<dyn FarmSource> = Arc::new(farm);

    // --- Commentary ---
    let generator = OpenAiClient::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
    );
    let commentary = Arc::new(CommentaryEngine::new(
        Arc::new(generator),
        PromptSet::embedded(),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        farm,
        commentary,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
