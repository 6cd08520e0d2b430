use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{ConsoleError, ConsoleResult};
use crate::gateway::{segment, ApiRequest};
use crate::identity::Operation;
use crate::pipeline::timefmt;

use super::Registry;

pub const BUILTIN_PREFIX: &str = "builtin:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    Builtin,
    Uploaded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoder {
    pub id: String,
    pub name: String,
    pub kind: DecoderKind,
    pub size_bytes: u64,
    #[serde(default, deserialize_with = "timefmt::deserialize_opt")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Decoder {
    pub fn is_deletable(&self) -> bool { self.kind == DecoderKind::Uploaded && !self.id.starts_with(BUILTIN_PREFIX) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderUpload {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
}

impl Registry {
    pub async fn list_decoders(&self, cancel: &CancellationToken) -> ConsoleResult<Vec<Decoder>> {
        self.client.authorize(Operation::ListDecoders)?;
        self.client.json(&ApiRequest::get("/decoders").label("Decoders load"), cancel).await
    }

    pub async fn get_decoder(&self, decoder_id: &str, cancel: &CancellationToken) -> ConsoleResult<Decoder> {
        self.client.authorize(Operation::ListDecoders)?;
        let req = ApiRequest::get(format!("/decoders/{}", segment(decoder_id))).label("Decoder lookup");
        self.client.json(&req, cancel).await
    }

    pub async fn decoder_source(&self, decoder_id: &str, cancel: &CancellationToken) -> ConsoleResult<String> {
        self.client.authorize(Operation::ViewDecoderSource)?;
        let req = ApiRequest::get(format!("/decoders/{}/source", segment(decoder_id))).label("Decoder source");
        self.client.text(&req, cancel).await
    }

    /// Only JavaScript sources are accepted.
    pub async fn upload_decoder(&self, filename: &str, source: Vec<u8>, cancel: &CancellationToken) -> ConsoleResult<DecoderUpload> {
        self.client.authorize(Operation::UploadDecoder)?;
        let name = filename.trim();
        if !name.to_ascii_lowercase().ends_with(".js") || name.len() <= 3 {
            return Err(ConsoleError::invalid("decoder must be a .js file"));
        }
        let req = ApiRequest::post("/decoders/upload").label("Decoder upload").multipart("upload", name, source);
        let uploaded: DecoderUpload = self.client.json(&req, cancel).await?;
        info!(id = %uploaded.id, size = uploaded.size_bytes, "registry: decoder uploaded {}", uploaded.name);
        Ok(uploaded)
    }

    pub async fn delete_decoder(&self, decoder_id: &str, cancel: &CancellationToken) -> ConsoleResult<()> {
        self.client.authorize(Operation::DeleteDecoder)?;
        if decoder_id.starts_with(BUILTIN_PREFIX) {
            return Err(ConsoleError::invalid("Built-in decoders cannot be deleted"));
        }
        let req = ApiRequest::delete(format!("/decoders/{}", segment(decoder_id))).label("Delete decoder");
        self.client.unit(&req, cancel).await
    }
}
