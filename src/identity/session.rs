use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ConsoleError, ConsoleResult};
use crate::gateway::{ApiClient, ApiRequest, Gateway};

use super::principal::Identity;
use super::store::CredentialStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credential.
    Anonymous,
    /// Credential installed, identity not yet resolved.
    Validating,
    Active,
    /// Last validation or a central auth failure revoked the credential.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub status: SessionStatus,
    pub identity: Option<Identity>,
}

struct SessionState {
    credential: Option<String>,
    identity: Option<Identity>,
    generation: u64,
    status: SessionStatus,
    scope: CancellationToken,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot { generation: self.generation, status: self.status.clone(), identity: self.identity.clone() }
    }
}

struct Inner {
    gateway: Gateway,
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    tx: watch::Sender<SessionSnapshot>,
}

/// Owns the credential and the identity resolved for it.
///
/// Every credential change bumps `generation` and cancels the previous session
/// scope; validation results carry the generation they started under and are
/// dropped if it is no longer current, so the last-set credential always wins.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

#[derive(Debug, serde::Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct LoginResponse {
    access_token: String,
}

impl SessionContext {
    pub fn new(gateway: Gateway, store: Arc<dyn CredentialStore>) -> Self {
        let state = SessionState {
            credential: None,
            identity: None,
            generation: 0,
            status: SessionStatus::Anonymous,
            scope: CancellationToken::new(),
        };
        let (tx, _rx) = watch::channel(state.snapshot());
        Self { inner: Arc::new(Inner { gateway, store, state: RwLock::new(state), tx }) }
    }

    pub fn gateway(&self) -> &Gateway { &self.inner.gateway }

    pub fn client(&self) -> ApiClient { ApiClient::new(self.clone()) }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> { self.inner.tx.subscribe() }

    pub fn snapshot(&self) -> SessionSnapshot { self.inner.state.read().snapshot() }

    pub fn identity(&self) -> Option<Identity> { self.inner.state.read().identity.clone() }

    pub fn generation(&self) -> u64 { self.inner.state.read().generation }

    /// Current credential with the generation it belongs to.
    pub fn credential(&self) -> (u64, Option<String>) {
        let st = self.inner.state.read();
        (st.generation, st.credential.clone())
    }

    /// Child of the current session scope. Cancelled on the next credential change.
    pub fn scope(&self) -> CancellationToken { self.inner.state.read().scope.child_token() }

    fn publish(&self, st: &SessionState) {
        self.inner.tx.send_replace(st.snapshot());
    }

    /// Load a persisted credential and install it pending validation.
    /// Returns true when one was found.
    pub fn restore(&self) -> bool {
        match self.inner.store.load() {
            Ok(Some(token)) => {
                self.install(&token);
                info!("session: restored persisted credential");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("session: could not read persisted credential: {:#}", e);
                false
            }
        }
    }

    /// Replace the active credential without validating it. A blank value logs out.
    /// The previous identity is cleared and in-flight scoped work is cancelled
    /// before this returns.
    pub fn install(&self, value: &str) -> u64 {
        let value = value.trim();
        let mut st = self.inner.state.write();
        st.scope.cancel();
        st.scope = CancellationToken::new();
        st.generation += 1;
        st.identity = None;
        if value.is_empty() {
            st.credential = None;
            st.status = SessionStatus::Anonymous;
            if let Err(e) = self.inner.store.clear() {
                warn!("session: could not clear persisted credential: {:#}", e);
            }
        } else {
            st.credential = Some(value.to_string());
            st.status = SessionStatus::Validating;
        }
        debug!(generation = st.generation, "session: credential installed");
        self.publish(&st);
        st.generation
    }

    /// Install `value` then validate it.
    pub async fn set_credential(&self, value: &str) -> ConsoleResult<Option<Identity>> {
        self.install(value);
        self.validate().await
    }

    /// Resolve the identity for the current credential.
    ///
    /// Success caches the identity and persists the credential. Any failure clears
    /// credential, identity and the persisted copy. A validation overtaken by a newer
    /// credential returns `Cancelled` and changes nothing.
    pub async fn validate(&self) -> ConsoleResult<Option<Identity>> {
        let (generation, credential, scope) = {
            let st = self.inner.state.read();
            (st.generation, st.credential.clone(), st.scope.child_token())
        };
        let Some(credential) = credential else { return Ok(None); };

        let req = ApiRequest::get("/auth/me").label("Identity lookup");
        let outcome = match self.inner.gateway.call(&req, Some(&credential), &scope).await {
            Ok(resp) => resp.json::<Identity>(),
            Err(e) => Err(e),
        };
        let outcome = outcome.and_then(|identity| {
            if identity.active { Ok(identity) } else { Err(ConsoleError::Auth { status: 403, message: "Account is disabled".into() }) }
        });

        let mut st = self.inner.state.write();
        if st.generation != generation {
            debug!(generation, current = st.generation, "session: dropping superseded validation");
            return Err(ConsoleError::Cancelled);
        }
        match outcome {
            Ok(identity) => {
                if let Err(e) = self.inner.store.save(&credential) {
                    warn!("session: could not persist credential: {:#}", e);
                }
                info!(email = %identity.email, role = %identity.role, "session: identity resolved");
                st.identity = Some(identity.clone());
                st.status = SessionStatus::Active;
                self.publish(&st);
                Ok(Some(identity))
            }
            Err(ConsoleError::Cancelled) => Err(ConsoleError::Cancelled),
            Err(e) => {
                warn!("session: validation failed: {}", e.message());
                self.clear_locked(&mut st, e.message().to_string());
                Err(e)
            }
        }
    }

    fn clear_locked(&self, st: &mut SessionState, reason: String) {
        st.scope.cancel();
        st.scope = CancellationToken::new();
        st.generation += 1;
        st.credential = None;
        st.identity = None;
        st.status = SessionStatus::Failed(reason);
        if let Err(e) = self.inner.store.clear() {
            warn!("session: could not clear persisted credential: {:#}", e);
        }
        self.publish(st);
    }

    /// Central handling of an auth failure seen by a call made under `generation`.
    /// Ignored if the credential has changed since. Returns true if the session was revoked.
    pub fn revoke(&self, generation: u64, reason: &str) -> bool {
        let mut st = self.inner.state.write();
        if st.generation != generation || st.credential.is_none() { return false; }
        warn!("session: credential revoked: {}", reason);
        self.clear_locked(&mut st, reason.to_string());
        true
    }

    /// Exchange email/password for a credential and validate it.
    /// A rejected login leaves the current session untouched.
    pub async fn login(&self, email: &str, password: &str) -> ConsoleResult<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ConsoleError::invalid("email and password are required"));
        }
        let req = ApiRequest::post("/auth/login")
            .anonymous()
            .label("Login")
            .json(&LoginBody { email, password })?;
        let resp = self.inner.gateway.call(&req, None, &CancellationToken::new()).await?;
        let body: LoginResponse = resp.json()?;
        if body.access_token.trim().is_empty() {
            return Err(ConsoleError::malformed("login returned an empty access token"));
        }
        info!(email = %email, "session: login accepted");
        self.set_credential(&body.access_token)
            .await?
            .ok_or_else(|| ConsoleError::malformed("login credential did not resolve an identity"))
    }

    pub fn logout(&self) {
        info!("session: logout");
        self.install("");
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
