mod config;
mod handlers;
pub mod service;


use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use handlers::AppState;
use service::DemoTranslator;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use vision::VisionClient;

use crate::config::{load_config, load_env_file};

#[derive(Parser)]
#[command(name = "menu-translator")]
struct Args {
    #[arg(long, default_value = "config")]
    config_file: String,

    /// Dotenv file read before the config layers; skipped when absent.
    #[arg(long, default_value = ".env")]
    env_file: String,

    #[arg(long)]
    demo: bool,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload/", post(handlers::upload))
        .route("/user/stats/", post(handlers::user_stats))
        .route("/stats/total", get(handlers::total_stats))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("server=info"));

    let args = Args::parse();
    if load_env_file(&args.env_file)? {
        log::info!("Loaded environment from {}", args.env_file);
    }

    if args.demo {
        log::info!("Running in DEMO mode (canned translations, in-memory usage ledger)");

        let pool = db::init_pool_in_memory().await?;
        db::create_usage_table(&pool).await?;

        let state = AppState {
            translator: Arc::new(DemoTranslator),
            pool,
            max_upload_bytes: 20 * 1024 * 1024,
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
        log::info!("Listening on http://127.0.0.1:8000");

        axum::serve(listener, build_router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        return Ok(());
    }

    let app_config = load_config(&args.config_file).await?;

    let pool = db::init_pool(&app_config.database_url).await?;
    db::create_usage_table(&pool).await?;

    let vision_client = VisionClient::new(app_config.vision_config())?;
    log::info!(
        "Using model {} at {}",
        app_config.model,
        app_config.openai_base_url
    );

    let state = AppState {
        translator: Arc::new(vision_client),
        pool: pool.clone(),
        max_upload_bytes: app_config.max_upload_bytes,
    };

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", app_config.host, app_config.port)).await?;
    log::info!(
        "Listening on http://{}:{}",
        app_config.host,
        app_config.port
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutting down");
}
