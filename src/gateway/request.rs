use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ConsoleError, ConsoleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Single-file multipart form (`field` is the form field name).
    Multipart { field: String, filename: String, bytes: Vec<u8> },
}

/// One call against the API, relative to the versioned base path.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub verb: Verb,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Skip the bearer header even when a credential is set.
    pub anonymous: bool,
    /// Operation name used in fallback failure messages ("<label> failed: <status>").
    pub label: String,
}

impl ApiRequest {
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            anonymous: false,
            label: verb.as_str().to_string(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self { Self::new(Verb::Get, path) }
    pub fn post(path: impl Into<String>) -> Self { Self::new(Verb::Post, path) }
    pub fn patch(path: impl Into<String>) -> Self { Self::new(Verb::Patch, path) }
    pub fn delete(path: impl Into<String>) -> Self { Self::new(Verb::Delete, path) }

    pub fn json<T: Serialize>(mut self, body: &T) -> ConsoleResult<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn multipart(mut self, field: &str, filename: &str, bytes: Vec<u8>) -> Self {
        self.body = RequestBody::Multipart { field: field.to_string(), filename: filename.to_string(), bytes };
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }
}

/// Percent-encode a single path segment (ids and tokens come from operator input).
pub fn segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

    pub fn text(&self) -> String { String::from_utf8_lossy(&self.body).into_owned() }

    pub fn json<T: DeserializeOwned>(&self) -> ConsoleResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ConsoleError::malformed(format!("unexpected response body: {}", e)))
    }

    /// Opaque download; the filename comes from `Content-Disposition` when present.
    pub fn into_payload(self, default_name: &str) -> Payload {
        let filename = self
            .content_disposition
            .as_deref()
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| default_name.to_string());
        Payload { filename, content_type: self.content_type, bytes: self.body }
    }
}

/// Binary result of a download or export. Never parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Payload {
    pub fn len(&self) -> usize { self.bytes.len() }
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }
}

static FILENAME_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)filename\*\s*=\s*[^']*'[^']*'([^;\s]+)"#).unwrap());
static FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#).unwrap());

// prefer RFC 5987 filename*=utf-8''name, then filename="name"
fn filename_from_disposition(header: &str) -> Option<String> {
    if let Some(c) = FILENAME_EXT.captures(header) {
        if let Ok(decoded) = urlencoding::decode(&c[1]) {
            if !decoded.is_empty() { return Some(decoded.into_owned()); }
        }
    }
    FILENAME
        .captures(header)
        .map(|c| c[1].trim().to_string())
        .filter(|v| !v.is_empty())
}
