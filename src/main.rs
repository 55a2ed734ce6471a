//! Padel club back-end entrypoint wiring REST, SSE, storage and background sweeps.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use padel_club_back::{
    config::AppConfig,
    dao::{club_store::ClubStore, club_store::memory::MemoryClubStore, storage::StorageError},
    routes,
    services::{expiry_sweeper, sse_events, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());

    spawn_storage_supervisor(app_state.clone())?;
    tokio::spawn(sse_events::forward_system_status(app_state.clone()));
    tokio::spawn(expiry_sweeper::run(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for the backend selected by `STORAGE_BACKEND`.
fn spawn_storage_supervisor(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| default_backend().into());
    info!(backend = %backend, "selecting storage backend");

    match backend.as_str() {
        "memory" => {
            let store = MemoryClubStore::new();
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ClubStore>) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" | "mongodb" => {
            use padel_club_back::dao::club_store::mongodb::{MongoClubStore, MongoConfig};

            let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            let attempts = env::var("MONGO_CONNECT_ATTEMPTS")
                .ok()
                .and_then(|value| value.parse::<u32>().ok());
            tokio::spawn(storage_supervisor::run(state, move || {
                let uri = uri.clone();
                let db_name = db_name.clone();
                async move {
                    let mut config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
                    if let Some(attempts) = attempts {
                        config.connect_attempts = attempts;
                    }
                    let store = MongoClubStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ClubStore>)
                }
            }));
        }
        other => anyhow::bail!("unsupported STORAGE_BACKEND `{other}`"),
    }

    Ok(())
}

fn default_backend() -> &'static str {
    if cfg!(feature = "mongo-store") {
        "mongo"
    } else {
        "memory"
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
