//! Top-level console: one session, the pipeline and registry bound to it, and
//! the view slots the operator screens render from.

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ConsoleConfig;
use crate::error::ConsoleResult;
use crate::gateway::{ApiRequest, Gateway};
use crate::identity::{resolve_route, CredentialStore, FileCredentialStore, Identity, Route, RouteDecision, SessionContext};
use crate::pipeline::{LogFile, Pipeline};
use crate::registry::{AdminUser, AuditEvent, AuditQuery, Decoder, DeviceCredential, Registry};
use crate::views::ViewSlot;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool { self.status.eq_ignore_ascii_case("ok") }
}

pub struct Console {
    session: SessionContext,
    pipeline: Pipeline,
    registry: Registry,
    pub files: ViewSlot<Vec<LogFile>>,
    pub devices: ViewSlot<Vec<DeviceCredential>>,
    pub decoders: ViewSlot<Vec<Decoder>>,
    pub users: ViewSlot<Vec<AdminUser>>,
    pub audit: ViewSlot<Vec<AuditEvent>>,
    pub health: ViewSlot<HealthStatus>,
}

impl Console {
    pub fn new(gateway: Gateway, store: Arc<dyn CredentialStore>) -> Self {
        let session = SessionContext::new(gateway, store);
        Self {
            pipeline: Pipeline::new(session.client()),
            registry: Registry::new(session.client()),
            session,
            files: ViewSlot::new("files"),
            devices: ViewSlot::new("devices"),
            decoders: ViewSlot::new("decoders"),
            users: ViewSlot::new("users"),
            audit: ViewSlot::new("audit"),
            health: ViewSlot::new("health"),
        }
    }

    /// HTTP gateway plus the on-disk credential file from `cfg`.
    pub fn from_config(cfg: &ConsoleConfig) -> anyhow::Result<Self> {
        let gateway = Gateway::http(cfg)?;
        let store = Arc::new(FileCredentialStore::new(cfg.credential_file.clone()));
        Ok(Self::new(gateway, store))
    }

    pub fn session(&self) -> &SessionContext { &self.session }
    pub fn pipeline(&self) -> &Pipeline { &self.pipeline }
    pub fn registry(&self) -> &Registry { &self.registry }

    /// Restore and validate a persisted credential, if any.
    pub async fn start(&self) -> ConsoleResult<Option<Identity>> {
        if !self.session.restore() {
            return Ok(None);
        }
        self.session.validate().await
    }

    pub async fn login(&self, email: &str, password: &str) -> ConsoleResult<Identity> {
        let identity = self.session.login(email, password).await?;
        self.clear_views();
        Ok(identity)
    }

    /// Drop the credential and everything loaded under it.
    pub fn logout(&self) {
        self.session.logout();
        self.clear_views();
    }

    pub fn navigate(&self, route: Route) -> RouteDecision {
        resolve_route(self.session.identity().as_ref(), route)
    }

    // View loads hang off the session scope so a credential change drops them.

    pub async fn refresh_files(&self) -> bool {
        self.files.refresh(&self.session.scope(), |c| async move { self.pipeline.list_files(&c).await }).await
    }

    pub async fn refresh_devices(&self) -> bool {
        self.devices.refresh(&self.session.scope(), |c| async move { self.registry.list_devices(&c).await }).await
    }

    pub async fn refresh_decoders(&self) -> bool {
        self.decoders.refresh(&self.session.scope(), |c| async move { self.registry.list_decoders(&c).await }).await
    }

    pub async fn refresh_users(&self) -> bool {
        self.users.refresh(&self.session.scope(), |c| async move { self.registry.list_users(&c).await }).await
    }

    pub async fn refresh_audit(&self, query: &AuditQuery) -> bool {
        self.audit.refresh(&self.session.scope(), |c| async move { self.registry.list_audit(query, &c).await }).await
    }

    /// Anonymous liveness probe; works without a session.
    pub async fn check_health(&self, cancel: &CancellationToken) -> bool {
        let gateway = self.session.gateway();
        self.health
            .refresh(cancel, |c| async move {
                let req = ApiRequest::get("/health").anonymous().label("Health check");
                gateway.call(&req, None, &c).await?.json::<HealthStatus>()
            })
            .await
    }

    fn clear_views(&self) {
        self.pipeline.reset();
        self.files.reset();
        self.devices.reset();
        self.decoders.reset();
        self.users.reset();
        self.audit.reset();
    }

    /// Cancel everything in flight; nothing loaded afterwards is applied.
    pub fn teardown(&self) {
        info!("console: teardown");
        self.clear_views();
        self.health.reset();
    }
}
