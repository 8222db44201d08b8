//! Router composition and server lifecycle

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::Method, middleware::from_fn_with_state, routing::get, Router};
use cactus_authz::{authorize_request, AuthorizationGatekeeper, AuthorizationState};
use cactus_core::{EndpointDescriptor, PluginRegistry};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{ApiServerConfig, AuthorizationProtocol};
use crate::error::{ConfigError, ServerError};
use crate::health::{get_health_check, watch_health_check, watch_health_check_path, HEALTH_CHECK_PATH};
use crate::plugins::build_registry;

/// How long open connections get to finish after shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Gateway composed from a validated configuration and a plugin registry
pub struct ApiServer {
    config: ApiServerConfig,
    registry: PluginRegistry,
}

impl ApiServer {
    /// Validate `config` and create the plugins it imports
    pub fn new(config: ApiServerConfig) -> Result<Self, ServerError> {
        Self::with_registry(config, PluginRegistry::new())
    }

    /// Like [`ApiServer::new`], keeping plugins already in `registry`.
    /// Configured imports are added after them.
    pub fn with_registry(
        config: ApiServerConfig,
        registry: PluginRegistry,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        build_registry(&config.plugins, &registry)?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &ApiServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Every endpoint: health check, watch channel and each web-service
    /// plugin's routes, behind the gatekeeper when one is configured.
    pub fn router(&self) -> Result<Router, ServerError> {
        let heartbeat = Duration::from_millis(self.config.realtime_heartbeat_ms);
        let watch_path = watch_health_check_path(&self.config.realtime_channel_path());

        let mut endpoints = vec![
            EndpointDescriptor::new(Method::GET, HEALTH_CHECK_PATH),
            EndpointDescriptor::new(Method::GET, watch_path.clone()).realtime_channel(),
        ];
        let mut router = Router::new()
            .route(HEALTH_CHECK_PATH, get(get_health_check))
            .route(&watch_path, get(move || watch_health_check(heartbeat)));

        for service in self.registry.get_web_services() {
            let declared = service.endpoints();
            for endpoint in &declared {
                let taken = endpoints
                    .iter()
                    .any(|e| e.http_verb == endpoint.http_verb && e.path == endpoint.path);
                if taken {
                    return Err(ServerError::DuplicateRoute {
                        method: endpoint.http_verb.to_string(),
                        path: endpoint.path.clone(),
                    });
                }
            }
            endpoints.extend(declared);
            router = router.merge(service.router());
        }

        if let (AuthorizationProtocol::JsonWebToken, Some(authz)) = (
            self.config.authorization_protocol,
            &self.config.authorization_config,
        ) {
            let gatekeeper = AuthorizationGatekeeper::new(authz.clone()).map_err(ConfigError::from)?;
            let state = AuthorizationState::new(gatekeeper, endpoints);
            router = router.route_layer(from_fn_with_state(state, authorize_request));
        } else {
            warn!("Authorization disabled, every endpoint is open");
        }

        Ok(router
            .layer(TraceLayer::new_for_http())
            .layer(self.cors_layer()?))
    }

    fn cors_layer(&self) -> Result<CorsLayer, ConfigError> {
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        Ok(match self.config.cors_origins()? {
            None => layer.allow_origin(Any),
            Some(origins) => layer.allow_origin(AllowOrigin::list(origins)),
        })
    }

    /// Bind the configured host and port and start serving
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        self.serve_on(listener)
    }

    /// Serve on an already bound listener
    pub fn serve_on(self, listener: TcpListener) -> Result<RunningServer, ServerError> {
        let router = self.router()?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(addr = %addr, plugins = self.registry.len(), "API server listening");
        Ok(RunningServer {
            addr,
            registry: self.registry,
            shutdown: shutdown_tx,
            handle,
        })
    }
}

/// Handle to a server started by [`ApiServer::start`]
pub struct RunningServer {
    addr: SocketAddr,
    registry: PluginRegistry,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Stop accepting connections and wait for open ones to finish.
    ///
    /// Connections still open after a grace period are dropped.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        let Self {
            addr,
            shutdown,
            mut handle,
            ..
        } = self;
        let _ = shutdown.send(());

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
            Ok(joined) => joined.map_err(|e| ServerError::Join(e.to_string()))??,
            Err(_) => {
                warn!(addr = %addr, "Connections still open after grace period, aborting");
                handle.abort();
            }
        }
        info!(addr = %addr, "API server stopped");
        Ok(())
    }
}
