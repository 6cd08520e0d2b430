use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::Url;

use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};

use super::request::{ApiRequest, ApiResponse, RequestBody, Verb};

/// Moves one request to the backend and back. Implementations report only
/// transport failures as errors; any HTTP status is a successful exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> ConsoleResult<ApiResponse>;
}

#[derive(Clone)]
pub struct HttpTransport {
    base: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(cfg: &ConsoleConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(cfg.http_timeout()).build()?;
        Self::with_client(&format!("{}{}", cfg.api_base, cfg.api_prefix), client)
    }

    pub fn with_client(base: &str, client: reqwest::Client) -> anyhow::Result<Self> {
        let base = base.trim_end_matches('/').to_string();
        // validate early so every later join is infallible in practice
        Url::parse(&base).map_err(|e| anyhow::anyhow!("invalid API base '{}': {}", base, e))?;
        Ok(Self { base, client })
    }

    pub fn base(&self) -> &str { &self.base }

    fn url_for(&self, request: &ApiRequest) -> ConsoleResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base, request.path))
            .map_err(|e| ConsoleError::invalid(format!("invalid request path '{}': {}", request.path, e)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> ConsoleResult<ApiResponse> {
        let url = self.url_for(request)?;
        let mut headers = HeaderMap::new();
        if let Some(token) = bearer {
            let v = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ConsoleError::invalid("credential contains characters not allowed in a header"))?;
            headers.insert(AUTHORIZATION, v);
        }
        let method = match request.verb {
            Verb::Get => reqwest::Method::GET,
            Verb::Post => reqwest::Method::POST,
            Verb::Patch => reqwest::Method::PATCH,
            Verb::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, url).headers(headers);
        match &request.body {
            RequestBody::Empty => {}
            RequestBody::Json(v) => { builder = builder.json(v); }
            RequestBody::Multipart { field, filename, bytes } => {
                let part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(filename.clone());
                builder = builder.multipart(reqwest::multipart::Form::new().part(field.clone(), part));
            }
        }
        let resp = builder.send().await.map_err(|e| ConsoleError::network(e.to_string()))?;
        let status = resp.status().as_u16();
        let content_type = resp.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);
        let content_disposition = resp.headers().get(CONTENT_DISPOSITION).and_then(|v| v.to_str().ok()).map(str::to_string);
        let body = resp.bytes().await.map_err(|e| ConsoleError::network(format!("response body error: {}", e)))?;
        Ok(ApiResponse { status, content_type, content_disposition, body: body.to_vec() })
    }
}
