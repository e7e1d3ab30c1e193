mod api;
mod auth;
mod middleware;
mod storage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    auth::SessionKeys,
    storage::ImageStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = vendmap_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting vendmap-server");

    let pool_config = vendmap_db::PoolConfig::from_app_config(&config);
    let pool = vendmap_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = vendmap_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations complete");

    let buildings = vendmap_core::load_buildings(&config.buildings_path)?;
    tracing::info!(count = buildings.all().len(), "building directory loaded");

    let images = ImageStore::new(
        config.image_dir.clone(),
        &config.public_base_url,
        config.max_image_bytes,
    );
    images.ensure_root().await?;

    if config.map_api_key.is_none() {
        tracing::warn!("GOOGLE_MAPS_API_KEY not set; /api/map-key will return null");
    }

    let state = AppState {
        pool,
        sessions: SessionKeys::new(&config.jwt_secret, config.session_ttl_secs),
        images,
        buildings: Arc::new(buildings),
        map_api_key: config.map_api_key.clone(),
    };
    let app = build_app(state, default_rate_limit_state(), &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
