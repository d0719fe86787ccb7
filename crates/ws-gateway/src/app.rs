//! Gateway assembly and lifecycle control
//!
//! [`Gateway::start`] spawns the child and binds the listener; [`Gateway::run`]
//! pumps child output to clients until a signal, the child's exit, or a server
//! failure triggers shutdown, then closes connections, kills the child and
//! returns the process exit code.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{handler::Handler, http::HeaderValue, middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use stdio_runner::{ChildEvent, ProcessSupervisor};
use wsgw_core::{AuthGate, CorsSetting, GatewayConfig, Lifecycle, ShutdownReason};

use crate::auth::require_bearer;
use crate::error::{GatewayError, Result};
use crate::gateway::{ws_upgrade_handler, ConnectionRegistry, RegistryEvent};
use crate::routes;
use crate::state::GatewayState;

/// Upper bound for the child to be reaped after a kill
const CHILD_EXIT_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound for the HTTP server to drain after the registry closes
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the HTTP router: upgrade path, health checks, and an authenticated
/// fallback for everything else
///
/// Only `GET` on the message and health paths skips the bearer middleware;
/// other methods on those paths are authenticated before getting a 405.
pub fn build_router(state: GatewayState, config: &GatewayConfig) -> Router {
    let bearer = middleware::from_fn_with_state(state.auth().clone(), require_bearer);
    let wrong_method = routes::method_not_allowed.layer(bearer.clone());

    let router = config.health_endpoints.iter().fold(
        Router::new().route(
            &config.message_path,
            get(ws_upgrade_handler).fallback(wrong_method.clone()),
        ),
        |router, path| {
            router.route(
                path,
                get(routes::health::health_check).fallback(wrong_method.clone()),
            )
        },
    );

    let guarded = Router::new().fallback(routes::not_found).layer(bearer);
    let router = router.with_state(state).merge(guarded);

    let router = match cors_layer(&config.cors) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

fn cors_layer(setting: &CorsSetting) -> Option<CorsLayer> {
    let allow_origin = match setting {
        CorsSetting::Disabled => return None,
        CorsSetting::AnyOrigin => AllowOrigin::from(Any),
        CorsSetting::Origins(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                })
                .collect();
            AllowOrigin::list(origins)
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Requests a signal-driven shutdown; extra triggers are ignored
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::UnboundedSender<&'static str>,
}

impl ShutdownTrigger {
    pub fn signal(&self, name: &'static str) {
        let _ = self.tx.send(name);
    }
}

/// A started gateway: child running, listener bound, not yet serving
pub struct Gateway {
    config: GatewayConfig,
    state: GatewayState,
    listener: TcpListener,
    local_addr: SocketAddr,
    child_events: mpsc::Receiver<ChildEvent>,
    shutdown_tx: mpsc::UnboundedSender<&'static str>,
    shutdown_rx: mpsc::UnboundedReceiver<&'static str>,
}

impl Gateway {
    /// Start on `0.0.0.0:<port>`
    pub async fn start(config: GatewayConfig) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        Self::start_on(config, addr).await
    }

    /// Spawn the child, then bind `addr`. A bind failure kills the child
    /// before returning.
    pub async fn start_on(config: GatewayConfig, addr: SocketAddr) -> Result<Self> {
        let config = config.validate()?;
        log_config(&config);

        let lifecycle = Arc::new(Lifecycle::new());
        let (child, mut child_events) =
            ProcessSupervisor::start(&config.stdio_command)?.into_parts();

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!("Error starting server on {}: {}", addr, source);
                lifecycle.begin_shutdown();
                child.kill();
                wait_for_child_exit(&mut child_events).await;
                lifecycle.mark_terminated();
                return Err(GatewayError::Bind { addr, source });
            }
        };
        let local_addr = listener.local_addr()?;

        let auth = AuthGate::new(config.api_token.clone());
        let registry = Arc::new(ConnectionRegistry::new());
        let state = GatewayState::new(auth, lifecycle, registry, child);
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            state,
            listener,
            local_addr,
            child_events,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Serve until shutdown and return the exit code for the process
    pub async fn run(self) -> i32 {
        let Gateway {
            config,
            state,
            listener,
            local_addr,
            mut child_events,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
        } = self;

        let app = build_router(state.clone(), &config);
        let registry = Arc::clone(state.registry());
        let mut registry_events = registry.subscribe();

        let serve_registry = Arc::clone(&registry);
        let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { serve_registry.closed().await })
                .await
        });
        let mut server_running = true;

        if state.lifecycle().mark_ready() {
            info!("Listening on {}", local_addr);
            info!("WebSocket endpoint: ws://{}{}", local_addr, config.message_path);
        }

        let mut child_exited = false;
        let reason = loop {
            tokio::select! {
                event = child_events.recv() => match event {
                    Some(ChildEvent::Line(line)) => {
                        state.router().on_child_line(&line).await;
                    }
                    Some(ChildEvent::Stderr(line)) => {
                        info!("Child stderr: {}", line);
                    }
                    Some(ChildEvent::Exited(report)) => {
                        error!(
                            "Child exited: code={:?}, signal={:?}",
                            report.code, report.signal
                        );
                        child_exited = true;
                        break ShutdownReason::from(report);
                    }
                    None => {
                        child_exited = true;
                        break ShutdownReason::Fatal("child event stream closed".to_string());
                    }
                },
                Some(signal) = shutdown_rx.recv() => {
                    info!("Caught {}, shutting down", signal);
                    break ShutdownReason::Signal(signal);
                }
                result = &mut server => {
                    server_running = false;
                    let message = match result {
                        Ok(Ok(())) => "HTTP server stopped unexpectedly".to_string(),
                        Ok(Err(e)) => format!("HTTP server error: {}", e),
                        Err(e) => format!("HTTP server task failed: {}", e),
                    };
                    error!("{}", message);
                    break ShutdownReason::Fatal(message);
                }
                event = registry_events.recv() => log_registry_event(event),
            }
        };

        if !state.lifecycle().begin_shutdown() {
            debug!("Shutdown already in progress");
        }

        // Each step runs even if the previous one had trouble
        registry.close_all().await;
        state.child().kill();
        if !child_exited {
            wait_for_child_exit(&mut child_events).await;
        }
        if server_running {
            match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, &mut server).await {
                Ok(Ok(Err(e))) => warn!("HTTP server error during shutdown: {}", e),
                Ok(_) => {}
                Err(_) => {
                    warn!("HTTP server did not stop in time, aborting");
                    server.abort();
                }
            }
        }

        state.lifecycle().mark_terminated();
        let code = reason.exit_code();
        info!("Gateway terminated ({:?}), exit code {}", reason, code);
        code
    }
}

/// Drain child events until the exit is observed or the timeout passes
async fn wait_for_child_exit(events: &mut mpsc::Receiver<ChildEvent>) {
    let drain = async {
        while let Some(event) = events.recv().await {
            if let ChildEvent::Exited(report) = event {
                debug!("Child reaped: code={:?}, signal={:?}", report.code, report.signal);
                return;
            }
        }
    };
    if tokio::time::timeout(CHILD_EXIT_TIMEOUT, drain).await.is_err() {
        warn!("Child did not exit within {:?}", CHILD_EXIT_TIMEOUT);
    }
}

/// Resolve with the name of the first termination signal received
#[cfg(unix)]
pub async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut hup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(term), Ok(hup)) => (term, hup),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to install signal handlers: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
        _ = hup.recv() => "SIGHUP",
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}

fn log_registry_event(event: std::result::Result<RegistryEvent, broadcast::error::RecvError>) {
    match event {
        Ok(RegistryEvent::Connected(id)) => info!("New WebSocket connection: {}", id),
        Ok(RegistryEvent::Disconnected(id)) => info!("WebSocket connection closed: {}", id),
        // Already logged by the registry
        Ok(RegistryEvent::Error { .. }) => {}
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            debug!("Skipped {} connection events", skipped)
        }
        Err(broadcast::error::RecvError::Closed) => {}
    }
}

fn log_config(config: &GatewayConfig) {
    info!("  - port: {}", config.port);
    info!("  - stdio: {}", config.stdio_command);
    info!("  - messagePath: {}", config.message_path);
    info!("  - CORS: {}", config.cors.describe());
    if config.health_endpoints.is_empty() {
        info!("  - Health endpoints: (none)");
    } else {
        info!("  - Health endpoints: {}", config.health_endpoints.join(", "));
    }
    if config.auth_enabled() {
        info!("HTTP API token authentication enabled");
    } else {
        info!("HTTP API token authentication disabled (anonymous access allowed)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Request, StatusCode},
        response::Response,
    };
    use stdio_runner::ChildHandle;
    use tower::ServiceExt;

    fn test_state(token: Option<&str>) -> GatewayState {
        let (child, _stdin) = ChildHandle::loopback();
        GatewayState::new(
            AuthGate::new(token.map(str::to_string)),
            Arc::new(Lifecycle::new()),
            Arc::new(ConnectionRegistry::new()),
            child,
        )
    }

    fn test_config() -> GatewayConfig {
        let mut config = GatewayConfig::new("cat");
        config.health_endpoints = vec!["/healthz".to_string()];
        config
    }

    async fn get(router: Router, uri: &str, authorization: Option<&str>) -> Response {
        send(router, "GET", uri, authorization).await
    }

    async fn send(
        router: Router,
        method: &str,
        uri: &str,
        authorization: Option<&str>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        router
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_readiness() {
        let state = test_state(None);
        let router = build_router(state.clone(), &test_config());

        let response = get(router.clone(), "/healthz", None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Server is not ready");

        state.lifecycle().mark_ready();
        let response = get(router, "/healthz", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn health_reports_dead_child() {
        let state = test_state(None);
        state.lifecycle().mark_ready();
        state.child().kill();
        tokio::time::timeout(Duration::from_secs(1), async {
            while state.child().is_alive() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let response = get(build_router(state, &test_config()), "/healthz", None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Child process has been killed");
    }

    #[tokio::test]
    async fn health_is_not_behind_auth() {
        let state = test_state(Some("secret"));
        state.lifecycle().mark_ready();
        let response = get(build_router(state, &test_config()), "/healthz", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn other_routes_require_bearer_token() {
        let state = test_state(Some("secret"));
        let router = build_router(state, &test_config());

        for auth in [None, Some("Bearer wrong"), Some("secret")] {
            let response = get(router.clone(), "/anything", auth).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body: serde_json::Value =
                serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(body["error"]["code"], -32001);
            assert_eq!(body["error"]["message"], "Unauthorized: Invalid or missing token");
            assert!(body["id"].is_null());
        }

        let response = get(router, "/anything", Some("Bearer secret")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_methods_on_known_paths_require_bearer_token() {
        let state = test_state(Some("secret"));
        state.lifecycle().mark_ready();
        let router = build_router(state, &test_config());

        for (method, uri) in [("POST", "/message"), ("DELETE", "/message"), ("POST", "/healthz")] {
            let response = send(router.clone(), method, uri, None).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
            let body: serde_json::Value =
                serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(body["error"]["code"], -32001);
            assert!(body["id"].is_null());

            let response = send(router.clone(), method, uri, Some("Bearer secret")).await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn open_gateway_serves_unknown_paths_as_not_found() {
        let router = build_router(test_state(None), &test_config());
        let response = get(router, "/anything", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upgrade_path_rejects_bad_token_with_bare_401() {
        let state = test_state(Some("secret"));
        let router = build_router(state, &test_config());

        let response = get(router.clone(), "/message", Some("Bearer wrong")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.is_empty());

        // Authorized, but not an upgrade request
        let response = get(router, "/message", Some("Bearer secret")).await;
        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn upgrade_refused_while_shutting_down() {
        let state = test_state(None);
        state.lifecycle().begin_shutdown();
        let response = get(build_router(state, &test_config()), "/message", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn cors_layer_follows_setting() {
        assert!(cors_layer(&CorsSetting::Disabled).is_none());
        assert!(cors_layer(&CorsSetting::AnyOrigin).is_some());
        assert!(cors_layer(&CorsSetting::Origins(vec!["https://a.example".into()])).is_some());
    }
}
