//! # Server Configuration
//!
//! Router assembly and listener lifecycle for the event webhook.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use thiserror::Error;
use tokio::{net::TcpListener, signal, task::JoinSet, time::Instant};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{AppConfig, ConfigError};
use crate::handlers;
use crate::ingest::EventIngestor;
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ingestor: EventIngestor,
}

/// Errors that stop the server from starting or keep it from serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no listener configured; set an HTTP or HTTPS port")]
    NoListeners,
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to load TLS certificate {cert} / key {key}: {source}")]
    Tls {
        cert: PathBuf,
        key: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{listener} listener failed: {source}")]
    Serve {
        listener: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("listener task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes();

    Router::new()
        .route("/", get(handlers::root))
        .route("/event", post(handlers::create_event))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Serves the application on every configured listener until `shutdown` is
/// cancelled or a listener fails.
///
/// A failing listener cancels `shutdown`, stopping the others. Once shutdown
/// starts, in-flight requests get `shutdown_grace` to finish.
pub async fn run_server(state: AppState, shutdown: CancellationToken) -> Result<(), ServerError> {
    let config = Arc::clone(&state.config);
    let http_addr = config.http_addr()?;
    let https_addr = config.https_addr()?;
    if http_addr.is_none() && https_addr.is_none() {
        return Err(ServerError::NoListeners);
    }

    let app = create_app(state);
    let grace = config.shutdown_grace();
    let mut listeners: JoinSet<Result<(), ServerError>> = JoinSet::new();

    if let Some(addr) = http_addr {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(%addr, "HTTP listener bound");

        let app = app.clone();
        let token = shutdown.clone();
        listeners.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
                .map_err(|source| ServerError::Serve {
                    listener: "http",
                    source,
                })
        });
    }

    if let Some(addr) = https_addr {
        let tls = RustlsConfig::from_pem_file(&config.tls_cert_path, &config.tls_key_path)
            .await
            .map_err(|source| ServerError::Tls {
                cert: config.tls_cert_path.clone(),
                key: config.tls_key_path.clone(),
                source,
            })?;
        info!(%addr, "HTTPS listener starting");

        let handle = Handle::new();
        let watcher = handle.clone();
        let token = shutdown.clone();
        listeners.spawn(async move {
            token.cancelled().await;
            watcher.graceful_shutdown(Some(grace));
            Ok(())
        });

        let app = app.clone();
        listeners.spawn(async move {
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(|source| ServerError::Serve {
                    listener: "https",
                    source,
                })
        });
    }

    info!(profile = %config.profile, "Event webhook serving");

    let mut first_error = None;
    let mut deadline: Option<Instant> = None;
    loop {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, listeners.join_next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(grace_seconds = grace.as_secs(), "Shutdown grace period elapsed; aborting listeners");
                    listeners.abort_all();
                    break;
                }
            },
            None => tokio::select! {
                next = listeners.join_next() => next,
                _ = shutdown.cancelled() => {
                    deadline = Some(Instant::now() + grace);
                    continue;
                }
            },
        };

        let Some(result) = next else {
            break;
        };
        let outcome = result.map_err(ServerError::from).and_then(|served| served);
        if let Err(err) = outcome {
            error!(error = %err, "Listener stopped with error");
            shutdown.cancel();
            first_error.get_or_insert(err);
        }
    }

    info!("Event webhook stopped");
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Cancels `token` on SIGINT or SIGTERM. Returns early if the token is
/// cancelled elsewhere.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = token.cancelled() => return,
    }

    info!("Shutdown signal received");
    token.cancel();
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::events::create_event,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::Event,
        )
    ),
    tags(
        (name = "root", description = "Service information"),
        (name = "events", description = "Event ingestion webhook")
    ),
    info(
        title = "Event Webhook API",
        description = "Accepts event notifications and records them in DynamoDB",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
