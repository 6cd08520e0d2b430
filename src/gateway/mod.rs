//! Resource gateway: every call to the remote API goes through here.
//! Attaches bearer credentials, normalizes non-success responses into
//! `ConsoleError`s, and races each call against its cancellation token.

mod client;
mod request;
mod transport;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ConsoleError, ConsoleResult};

pub use client::ApiClient;
pub use request::{segment, ApiRequest, ApiResponse, Payload, RequestBody, Verb};
pub use transport::{HttpTransport, Transport};

#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self { Self { transport } }

    pub fn http(cfg: &crate::config::ConsoleConfig) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(cfg)?)))
    }

    /// Issue `request`, returning the raw success response.
    ///
    /// The bearer header is attached unless the request is anonymous or `credential`
    /// is absent/blank. A cancelled call yields `Cancelled` even when the response
    /// already arrived, so no caller ever applies a late result.
    pub async fn call(
        &self,
        request: &ApiRequest,
        credential: Option<&str>,
        cancel: &CancellationToken,
    ) -> ConsoleResult<ApiResponse> {
        if cancel.is_cancelled() { return Err(ConsoleError::Cancelled); }
        let bearer = if request.anonymous { None } else { credential.filter(|c| !c.trim().is_empty()) };
        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(method = request.verb.as_str(), path = %request.path, "gateway call cancelled");
                return Err(ConsoleError::Cancelled);
            }
            r = self.transport.execute(request, bearer) => r?,
        };
        if cancel.is_cancelled() { return Err(ConsoleError::Cancelled); }
        debug!(method = request.verb.as_str(), path = %request.path, status = resp.status, auth = bearer.is_some(), "gateway call");
        if !resp.is_success() {
            return Err(ConsoleError::from_status(resp.status, &resp.text(), &request.label));
        }
        Ok(resp)
    }
}
