//! Dia-e Back binary entrypoint wiring REST, WebSocket, SSE and the record store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dia_e_back::{
    config::AppConfig,
    dao::record_store::memory::MemoryRecordStore,
    routes,
    state::{AppState, SharedState},
};

const DEFAULT_BACKEND: &str = "memory";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    install_store(app_state.clone()).await?;

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

/// Pick the record store from `STORE_BACKEND`. MongoDB is supervised in the background;
/// until it connects the server runs in degraded mode.
async fn install_store(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| DEFAULT_BACKEND.into());
    match backend.as_str() {
        "memory" => {
            warn!("using the in-memory record store; rooms are lost on restart");
            state.set_store(Arc::new(MemoryRecordStore::new())).await;
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            tokio::spawn(dia_e_back::services::storage_supervisor::run(
                state,
                move || mongo::connect(uri.clone(), db_name.clone()),
            ));
        }
        other => anyhow::bail!("unsupported STORE_BACKEND `{other}`"),
    }
    Ok(())
}

#[cfg(feature = "mongo-store")]
mod mongo {
    use std::sync::Arc;

    use dia_e_back::dao::{
        record_store::{
            RecordStore,
            mongodb::{MongoConfig, MongoRecordStore},
        },
        storage::StorageError,
    };

    /// Parse the URI and open a store with its indexes in place.
    pub async fn connect(
        uri: String,
        db_name: Option<String>,
    ) -> Result<Arc<dyn RecordStore>, StorageError> {
        let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
        let store = MongoRecordStore::connect(config).await?;
        Ok(Arc::new(store))
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
                warn!(error = %err, "cannot listen for SIGTERM; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
