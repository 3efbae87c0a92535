mod health;
mod request_context;

use std::net::SocketAddr;

use axum::Router;
use parley_config::Config;
use parley_llm::LlmState;
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the completion backend cannot be initialized
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let llm_state = LlmState::from_config(config)?;
        Ok(Self::with_state(config, llm_state))
    }

    /// Build the server around an existing completion state
    pub fn with_state(config: &Config, llm_state: LlmState) -> Self {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let mut app = Router::new();

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        app = app.merge(parley_llm::llm_router(llm_state));

        // Innermost first
        app = app.layer(axum::middleware::from_fn(request_context::request_id_middleware));
        app = app.layer(TraceLayer::new_for_http());

        Self {
            router: app,
            listen_address,
        }
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::{Request, StatusCode};
    use parley_core::REQUEST_ID_HEADER;
    use tower::ServiceExt;

    use super::*;

    fn router(config: &Config) -> Router {
        Server::new(config).unwrap().into_router()
    }

    #[tokio::test]
    async fn health_route_follows_config() {
        let mut config = Config::default();
        config.server.health.path = "/healthz".to_owned();

        let response = router(&config)
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        config.server.health.enabled = false;
        let response = router(&config)
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn request_id_is_echoed_or_generated() {
        let config = Config::default();

        let response = router(&config)
            .oneshot(
                Request::get("/health")
                    .header(REQUEST_ID_HEADER, "trace-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-42");

        let response = router(&config)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER].len(), 32);
    }

    #[test]
    fn default_listen_address() {
        let server = Server::new(&Config::default()).unwrap();
        assert_eq!(server.listen_address(), SocketAddr::from(([0, 0, 0, 0], 3000)));
    }
}
