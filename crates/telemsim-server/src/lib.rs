//! Telemsim Web Server - Axum REST + WebSocket
//!
//! Exposes the simulation engine over HTTP. The engine runs on its own
//! thread and handlers reach it through [`EngineHandle`], so every request
//! is applied to the engine state atomically.

pub mod api;
pub mod ws;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use telemsim_core::{ConfigPatch, Configuration, Measurement, Simulator, Status};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Commands sent to the engine thread
pub enum EngineCommand {
    GetConfiguration {
        reply: oneshot::Sender<Configuration>,
    },
    UpdateConfiguration {
        patch: ConfigPatch,
        reply: oneshot::Sender<telemsim_core::Result<Configuration>>,
    },
    Tick {
        reply: oneshot::Sender<Status>,
    },
    /// Generate if ready, then snapshot the buffer
    PollMeasurements {
        reply: oneshot::Sender<telemsim_core::Result<MeasurementPoll>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Measurement>>,
    },
    ClearMeasurements {
        reply: oneshot::Sender<telemsim_core::Result<()>>,
    },
}

/// Result of a measurements poll
#[derive(Clone, Debug)]
pub struct MeasurementPoll {
    /// Measurement generated by this poll, if the gate was open
    pub generated: Option<Measurement>,
    /// Buffer contents after the poll, oldest first
    pub measurements: Vec<Measurement>,
}

/// Handle to communicate with the engine thread
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

fn engine_gone<E>(_: E) -> anyhow::Error {
    anyhow::anyhow!("Engine thread died")
}

impl EngineHandle {
    /// Move `simulator` onto a dedicated thread and return a handle
    pub fn spawn(mut simulator: Simulator) -> Self {
        let (tx, mut rx) = mpsc::channel::<EngineCommand>(32);

        std::thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    EngineCommand::GetConfiguration { reply } => {
                        let _ = reply.send(simulator.configuration().clone());
                    }
                    EngineCommand::UpdateConfiguration { patch, reply } => {
                        let _ = reply.send(simulator.update_configuration(&patch));
                    }
                    EngineCommand::Tick { reply } => {
                        let _ = reply.send(simulator.tick());
                    }
                    EngineCommand::PollMeasurements { reply } => {
                        let poll = simulator
                            .maybe_generate_and_store()
                            .map(|generated| MeasurementPoll {
                                generated,
                                measurements: simulator.measurements(),
                            });
                        let _ = reply.send(poll);
                    }
                    EngineCommand::Snapshot { reply } => {
                        let _ = reply.send(simulator.measurements());
                    }
                    EngineCommand::ClearMeasurements { reply } => {
                        let _ = reply.send(simulator.clear_measurements());
                    }
                }
            }
            tracing::debug!("Engine thread stopped");
        });

        Self { tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> anyhow::Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(engine_gone)?;
        rx.await.map_err(engine_gone)
    }

    pub async fn configuration(&self) -> anyhow::Result<Configuration> {
        self.request(|reply| EngineCommand::GetConfiguration { reply })
            .await
    }

    pub async fn update_configuration(&self, patch: ConfigPatch) -> anyhow::Result<Configuration> {
        Ok(self
            .request(|reply| EngineCommand::UpdateConfiguration { patch, reply })
            .await??)
    }

    /// Advance the readiness gate and read the status
    pub async fn tick(&self) -> anyhow::Result<Status> {
        self.request(|reply| EngineCommand::Tick { reply }).await
    }

    pub async fn poll_measurements(&self) -> anyhow::Result<MeasurementPoll> {
        Ok(self
            .request(|reply| EngineCommand::PollMeasurements { reply })
            .await??)
    }

    /// Buffer contents without generating
    pub async fn snapshot(&self) -> anyhow::Result<Vec<Measurement>> {
        self.request(|reply| EngineCommand::Snapshot { reply }).await
    }

    pub async fn clear_measurements(&self) -> anyhow::Result<()> {
        Ok(self
            .request(|reply| EngineCommand::ClearMeasurements { reply })
            .await??)
    }
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to engine thread
    pub engine: EngineHandle,
    /// WebSocket broadcast channel of newly generated measurements
    pub ws_tx: tokio::sync::broadcast::Sender<Measurement>,
    /// Server configuration
    pub config: ServerConfig,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_addr: "0.0.0.0".to_string(),
        }
    }
}

impl AppState {
    pub fn new(engine: EngineHandle, config: ServerConfig) -> Self {
        let (ws_tx, _) = tokio::sync::broadcast::channel(256);
        Self {
            engine,
            ws_tx,
            config,
        }
    }
}

/// Simulator routes, mounted both at the root and under `/api`
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/configuration",
            get(api::get_configuration).put(api::update_configuration),
        )
        .route("/status", get(api::get_status))
        .route(
            "/measurements",
            get(api::get_measurements).delete(api::clear_measurements),
        )
        .route("/ws", get(ws::ws_handler))
}

/// Build the Axum router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start the web server, stopping on Ctrl+C
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.bind_addr, state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Telemsim server listening");

    serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
