//! Gateway state shared by the HTTP handlers and the lifecycle controller

use std::sync::Arc;

use stdio_runner::ChildHandle;
use wsgw_core::{AuthGate, Lifecycle};

use crate::gateway::ConnectionRegistry;
use crate::relay::MessageRouter;

/// Explicit context built once at startup
#[derive(Clone)]
pub struct GatewayState {
    inner: Arc<GatewayStateInner>,
}

struct GatewayStateInner {
    auth: AuthGate,
    lifecycle: Arc<Lifecycle>,
    registry: Arc<ConnectionRegistry>,
    router: MessageRouter,
    child: ChildHandle,
}

impl GatewayState {
    pub fn new(
        auth: AuthGate,
        lifecycle: Arc<Lifecycle>,
        registry: Arc<ConnectionRegistry>,
        child: ChildHandle,
    ) -> Self {
        let router = MessageRouter::new(Arc::clone(&registry), child.clone());
        Self {
            inner: Arc::new(GatewayStateInner {
                auth,
                lifecycle,
                registry,
                router,
                child,
            }),
        }
    }

    pub fn auth(&self) -> &AuthGate {
        &self.inner.auth
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.inner.lifecycle
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.inner.registry
    }

    pub fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    pub fn child(&self) -> &ChildHandle {
        &self.inner.child
    }
}
