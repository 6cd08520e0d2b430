use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ConsoleError, ConsoleResult};
use crate::gateway::{segment, ApiClient, ApiRequest, Payload};
use crate::identity::Operation;
use crate::views::{ViewSlot, ViewState};

use super::generate::{strip_separators, GenerateRequest};
use super::models::{DecodeResultSet, ExportFormat, FilePreview, LogFile, ReplayJob, ScanContext, ScanToken};
use super::state::FileScanState;

pub const RAW_DECODER: &str = "raw";
pub const DEFAULT_REPLAY_HOST: &str = "127.0.0.1";
pub const DEFAULT_REPLAY_PORT: u32 = 1700;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodeRequest {
    pub scan_token: String,
    /// Blank selects the raw decoder.
    pub decoder_id: String,
    /// Empty means no device filter.
    pub device_addrs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRequest {
    pub scan_token: String,
    pub udp_host: String,
    /// Wider than `u16` so out-of-range operator input reaches validation.
    pub udp_port: u32,
}

impl ReplayRequest {
    pub fn new(scan_token: impl Into<String>) -> Self {
        Self { scan_token: scan_token.into(), udp_host: DEFAULT_REPLAY_HOST.into(), udp_port: DEFAULT_REPLAY_PORT }
    }

    pub fn validate(&self) -> ConsoleResult<()> {
        if self.udp_host.trim().is_empty() {
            return Err(ConsoleError::invalid("UDP host is required"));
        }
        if !(1..=65535).contains(&self.udp_port) {
            return Err(ConsoleError::invalid(format!("UDP port must be between 1 and 65535, got {}", self.udp_port)));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct DecodeBody<'a> {
    scan_token: &'a str,
    decoder_id: &'a str,
    #[serde(rename = "devaddrs")]
    device_addrs: Option<&'a [String]>,
}

#[derive(Serialize)]
struct ReplayBody<'a> {
    scan_token: &'a str,
    udp_host: &'a str,
    udp_port: u16,
}

/// Split comma-separated device addresses, normalizing each and dropping blanks.
pub fn parse_device_filter(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| strip_separators(s).to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn require_token(token: &str) -> ConsoleResult<&str> {
    let t = token.trim();
    if t.is_empty() { Err(ConsoleError::invalid_token("scan token is required")) } else { Ok(t) }
}

/// A missing decoder is not a token problem.
fn token_rejection(err: ConsoleError) -> ConsoleError {
    match err {
        ConsoleError::NotFound { message } if !message.contains("Decoder not found") => ConsoleError::InvalidToken { message },
        other => other,
    }
}

/// Upload/generate → scan → decode or replay. Holds per-file scan state and the
/// latest decode and replay submissions; a newer submission supersedes an older one
/// still in flight.
pub struct Pipeline {
    client: ApiClient,
    files: RwLock<HashMap<String, FileScanState>>,
    decode: ViewSlot<DecodeResultSet>,
    replay: ViewSlot<ReplayJob>,
}

impl Pipeline {
    pub fn new(client: ApiClient) -> Self {
        Self { client, files: RwLock::new(HashMap::new()), decode: ViewSlot::new("decode"), replay: ViewSlot::new("replay") }
    }

    pub fn client(&self) -> &ApiClient { &self.client }

    /// Forget scan state and submissions, cancelling any still in flight. Used on login and logout.
    pub fn reset(&self) {
        self.files.write().clear();
        self.decode.reset();
        self.replay.reset();
    }

    pub async fn list_files(&self, cancel: &CancellationToken) -> ConsoleResult<Vec<LogFile>> {
        self.client.authorize(Operation::ListFiles)?;
        let files: Vec<LogFile> = self.client.json(&ApiRequest::get("/files").label("Files load"), cancel).await?;
        let mut st = self.files.write();
        st.retain(|id, _| files.iter().any(|f| &f.id == id));
        Ok(files)
    }

    pub async fn get_file(&self, file_id: &str, cancel: &CancellationToken) -> ConsoleResult<LogFile> {
        self.client.authorize(Operation::ListFiles)?;
        let req = ApiRequest::get(format!("/files/{}", segment(file_id))).label("File lookup");
        self.client.json(&req, cancel).await
    }

    pub async fn upload_file(&self, filename: &str, bytes: Vec<u8>, cancel: &CancellationToken) -> ConsoleResult<LogFile> {
        self.client.authorize(Operation::UploadFile)?;
        if filename.trim().is_empty() {
            return Err(ConsoleError::invalid("a file name is required"));
        }
        let req = ApiRequest::post("/files/upload").label("Upload").multipart("upload", filename, bytes);
        let file: LogFile = self.client.json(&req, cancel).await?;
        info!(id = %file.id, size = file.size_bytes, "pipeline: uploaded {}", file.filename);
        Ok(file)
    }

    pub async fn generate_file(&self, request: GenerateRequest, cancel: &CancellationToken) -> ConsoleResult<LogFile> {
        self.client.authorize(Operation::GenerateFile)?;
        request.validate()?;
        let req = ApiRequest::post("/files/generate").label("Generate").json(&request.normalized())?;
        let file: LogFile = self.client.json(&req, cancel).await?;
        info!(id = %file.id, size = file.size_bytes, "pipeline: generated {}", file.filename);
        Ok(file)
    }

    pub async fn preview_file(&self, file_id: &str, cancel: &CancellationToken) -> ConsoleResult<FilePreview> {
        self.client.authorize(Operation::PreviewFile)?;
        let req = ApiRequest::get(format!("/files/{}/preview", segment(file_id))).label("Preview");
        self.client.json(&req, cancel).await
    }

    pub async fn download_file(&self, file_id: &str, cancel: &CancellationToken) -> ConsoleResult<Payload> {
        self.client.authorize(Operation::DownloadFile)?;
        let req = ApiRequest::get(format!("/files/{}/download", segment(file_id))).label("Download");
        self.client.payload(&req, &format!("{}.jsonl", file_id), cancel).await
    }

    pub async fn delete_file(&self, file_id: &str, cancel: &CancellationToken) -> ConsoleResult<()> {
        self.client.authorize(Operation::DeleteFile)?;
        let req = ApiRequest::delete(format!("/files/{}", segment(file_id))).label("Delete");
        self.client.unit(&req, cancel).await?;
        self.files.write().remove(file_id);
        Ok(())
    }

    /// Every scan yields a fresh token; earlier ones are left to expire.
    pub async fn scan(&self, file_id: &str, cancel: &CancellationToken) -> ConsoleResult<ScanToken> {
        self.client.authorize(Operation::ScanFile)?;
        let req = ApiRequest::post(format!("/files/{}/scan", segment(file_id))).label("Scan");
        let token: ScanToken = self.client.json(&req, cancel).await?;
        info!(file = %file_id, records = token.summary.record_count, devices = token.summary.device_addrs.len(), "pipeline: scan complete");
        let mut files = self.files.write();
        let st = files.remove(file_id).unwrap_or_default();
        files.insert(file_id.to_string(), st.on_scanned(token.clone()));
        Ok(token)
    }

    pub fn scan_state(&self, file_id: &str) -> FileScanState {
        self.files.read().get(file_id).cloned().unwrap_or_default()
    }

    /// Active scan token of a file, as handed to the decode and replay stages.
    pub fn handoff(&self, file_id: &str) -> Option<ScanToken> {
        self.files.read().get(file_id).and_then(|s| s.active_token().cloned())
    }

    fn reject_token(&self, token: &str) {
        let mut files = self.files.write();
        for st in files.values_mut() {
            *st = std::mem::take(st).on_token_rejected(token);
        }
        debug!(token, "pipeline: scan token rejected");
    }

    fn on_token_error<T>(&self, token: &str, result: ConsoleResult<T>) -> ConsoleResult<T> {
        result.map_err(|e| {
            let e = token_rejection(e);
            if matches!(e, ConsoleError::InvalidToken { .. }) {
                self.reject_token(token);
            }
            e
        })
    }

    pub async fn lookup_scan(&self, scan_token: &str, cancel: &CancellationToken) -> ConsoleResult<ScanContext> {
        self.client.authorize(Operation::LookupScan)?;
        let token = require_token(scan_token)?;
        let req = ApiRequest::get(format!("/scan/{}", segment(token))).label("Scan lookup");
        let result = self.client.json(&req, cancel).await;
        self.on_token_error(token, result)
    }

    pub async fn decode(&self, request: &DecodeRequest, cancel: &CancellationToken) -> ConsoleResult<DecodeResultSet> {
        self.client.authorize(Operation::Decode)?;
        let token = require_token(&request.scan_token)?;
        let decoder_id = match request.decoder_id.trim() {
            "" => RAW_DECODER,
            d => d,
        };
        let body = DecodeBody {
            scan_token: token,
            decoder_id,
            device_addrs: (!request.device_addrs.is_empty()).then_some(request.device_addrs.as_slice()),
        };
        let req = ApiRequest::post("/decode").label("Decode").json(&body)?;
        let ticket = self.decode.begin(cancel);
        let result = self.client.json::<DecodeResultSet>(&req, ticket.token()).await;
        let result = self.on_token_error(token, result);
        let set = self.decode.settle(&ticket, result)?;
        info!(decoder = decoder_id, rows = set.rows.len(), ok = set.ok_count(), "pipeline: decode complete");
        Ok(set)
    }

    /// The latest decode submission: its result set, error and whether it is still running.
    pub fn current_decode(&self) -> ViewState<DecodeResultSet> { self.decode.snapshot() }

    /// Result set for `decode_token` if it belongs to the latest completed decode.
    pub fn decode_results(&self, decode_token: &str) -> Option<DecodeResultSet> {
        self.decode.inspect(|set| set.filter(|s| s.token == decode_token).cloned())
    }

    /// Only the token of the latest completed decode is exportable.
    pub async fn export(&self, decode_token: &str, format: ExportFormat, cancel: &CancellationToken) -> ConsoleResult<Payload> {
        self.client.authorize(Operation::ExportDecode)?;
        let token = decode_token.trim();
        let known = self.decode.inspect(|set| set.is_some_and(|s| s.token == token));
        if token.is_empty() || !known {
            return Err(ConsoleError::not_found("no decode results to export"));
        }
        let req = ApiRequest::get(format!("/decode/{}/export/{}", segment(token), format.as_str())).label("Export");
        self.client.payload(&req, &format.default_filename(), cancel).await
    }

    pub async fn replay(&self, request: &ReplayRequest, cancel: &CancellationToken) -> ConsoleResult<ReplayJob> {
        self.client.authorize(Operation::Replay)?;
        let token = require_token(&request.scan_token)?;
        request.validate()?;
        let body = ReplayBody {
            scan_token: token,
            udp_host: request.udp_host.trim(),
            udp_port: u16::try_from(request.udp_port).map_err(|_| ConsoleError::invalid("UDP port out of range"))?,
        };
        let req = ApiRequest::post("/replay").label("Replay").json(&body)?;
        let ticket = self.replay.begin(cancel);
        let result = self.client.json::<ReplayJob>(&req, ticket.token()).await;
        let result = self.on_token_error(token, result);
        let job = self.replay.settle(&ticket, result)?;
        info!(job = %job.id, sent = job.sent_count(), total = job.rows.len(), "pipeline: replay complete");
        Ok(job)
    }

    /// The latest replay submission.
    pub fn current_replay(&self) -> ViewState<ReplayJob> { self.replay.snapshot() }

    pub async fn replay_job(&self, job_id: &str, cancel: &CancellationToken) -> ConsoleResult<ReplayJob> {
        self.client.authorize(Operation::LookupReplay)?;
        let req = ApiRequest::get(format!("/replay/{}", segment(job_id))).label("Replay lookup");
        self.client.json(&req, cancel).await
    }
}
