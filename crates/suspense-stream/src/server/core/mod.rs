use axum::{Router, routing::get};
use colored::Colorize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::StreamError;
use crate::server::config::Config;
use crate::server::handlers::demo_handler::{demo_page, health};
use crate::server::middleware::SuspenseLayer;
use crate::server::types::ServerState;

pub struct Server {
    router: Router,
    config: Config,
    listener: TcpListener,
    address: SocketAddr,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, StreamError> {
        let router = Self::build_router(&config);

        let address = config.server_address();

        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| StreamError::transport(format!("Failed to bind to {address}: {e}")))?;

        let socket_addr = listener
            .local_addr()
            .map_err(|e| StreamError::transport(format!("Failed to get local address: {e}")))?;

        Ok(Self { router, config, listener, address: socket_addr })
    }

    pub fn build_router(config: &Config) -> Router {
        let state = ServerState::new(config.clone());

        let router = Router::new()
            .route("/", get(demo_page))
            .route("/health", get(health))
            .layer(SuspenseLayer::new(config.streaming.clone()))
            .with_state(state);

        if config.server.enable_logging { router.layer(TraceLayer::new_for_http()) } else { router }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub async fn start(self) -> Result<(), StreamError> {
        info!(
            "{} {} in {} mode",
            "suspense-stream".bold().cyan(),
            format!("listening on http://{}", self.address).green(),
            self.config.mode.to_string().yellow()
        );

        axum::serve(self.listener, self.router).await.map_err(|e| {
            error!("Server error: {}", e);
            StreamError::transport(format!("Server error: {e}"))
        })
    }
}
