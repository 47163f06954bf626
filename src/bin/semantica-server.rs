//! semantica HTTP server.
//!
//! Routes are defined in [`semantica::http`].
//!
//! Build and run: `cargo run --features server --bin semantica-server`

use std::sync::Arc;

use semantica::config::SemanticaConfig;
use semantica::engine::Engine;
use semantica::http;
use semantica::paths::SemanticaPaths;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let paths = SemanticaPaths::resolve().unwrap_or_else(|e| {
        tracing::error!("failed to resolve XDG paths: {e}");
        std::process::exit(1);
    });
    if let Err(e) = paths.ensure_dirs() {
        tracing::error!("failed to create XDG directories: {e}");
        std::process::exit(1);
    }

    let mut config = SemanticaConfig::load(&paths.config_file()).unwrap_or_else(|e| {
        tracing::error!("failed to load config: {e}");
        std::process::exit(1);
    });
    if let Err(e) = config.apply_env() {
        tracing::error!("invalid environment override: {e}");
        std::process::exit(1);
    }
    let addr = config.server.addr();

    let engine = Engine::new(config, &paths).unwrap_or_else(|e| {
        tracing::error!("failed to open store: {e}");
        std::process::exit(1);
    });
    tracing::info!(backend = %engine.client().backend().describe(), "semantica server initialized");

    let app = http::router(Arc::new(engine));

    tracing::info!("semantica server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
