use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::{ConsoleError, ConsoleResult};
use crate::identity::{authorize, Operation, SessionContext};

use super::request::{ApiRequest, ApiResponse, Payload};

/// Gateway bound to a session: reads the live credential for every call and
/// routes auth failures to the session instead of the caller's view.
#[derive(Clone)]
pub struct ApiClient {
    session: SessionContext,
}

impl ApiClient {
    pub fn new(session: SessionContext) -> Self { Self { session } }

    pub fn session(&self) -> &SessionContext { &self.session }

    /// Capability check against the current identity; no request is issued.
    pub fn authorize(&self, op: Operation) -> ConsoleResult<()> {
        authorize(self.session.identity().as_ref(), op)
    }

    /// Send under the current credential. Cancelled by `cancel` or by any
    /// credential change while in flight.
    pub async fn send(&self, request: &ApiRequest, cancel: &CancellationToken) -> ConsoleResult<ApiResponse> {
        let (generation, credential) = self.session.credential();
        let session_scope = self.session.scope();
        if self.session.generation() != generation { return Err(ConsoleError::Cancelled); }
        let result = tokio::select! {
            biased;
            _ = session_scope.cancelled() => Err(ConsoleError::Cancelled),
            r = self.session.gateway().call(request, credential.as_deref(), cancel) => r,
        };
        if session_scope.is_cancelled() { return Err(ConsoleError::Cancelled); }
        if let Err(ConsoleError::Auth { message, .. }) = &result {
            if !request.anonymous {
                self.session.revoke(generation, message);
            }
        }
        result
    }

    pub async fn json<T: DeserializeOwned>(&self, request: &ApiRequest, cancel: &CancellationToken) -> ConsoleResult<T> {
        self.send(request, cancel).await?.json()
    }

    /// For calls whose success body carries nothing: `204 No Content` and a JSON
    /// acknowledgement are treated the same.
    pub async fn unit(&self, request: &ApiRequest, cancel: &CancellationToken) -> ConsoleResult<()> {
        self.send(request, cancel).await.map(|_| ())
    }

    pub async fn text(&self, request: &ApiRequest, cancel: &CancellationToken) -> ConsoleResult<String> {
        Ok(self.send(request, cancel).await?.text())
    }

    pub async fn payload(&self, request: &ApiRequest, default_name: &str, cancel: &CancellationToken) -> ConsoleResult<Payload> {
        Ok(self.send(request, cancel).await?.into_payload(default_name))
    }
}
