use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Backend timestamps are RFC 3339 or naive ISO-8601 (read as UTC).
pub(crate) mod timefmt {
    use super::*;

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) { return Some(dt.with_timezone(&Utc)); }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok().map(|n| n.and_utc())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s)))
    }

    pub fn deserialize_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(s) => parse(&s).map(Some).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Uploaded,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFile {
    pub id: String,
    #[serde(rename = "original_filename")]
    pub filename: String,
    pub size_bytes: u64,
    #[serde(deserialize_with = "timefmt::deserialize")]
    pub uploaded_at: DateTime<Utc>,
    pub source_type: SourceType,
    #[serde(rename = "metadata_json", default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub record_count: u64,
    #[serde(rename = "gateway_euis", default)]
    pub gateway_ids: Vec<String>,
    #[serde(rename = "devaddrs", default)]
    pub device_addrs: Vec<String>,
}

/// Short-lived link between one log file and the decode/replay stages.
/// Forwarded verbatim; never built locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanToken {
    pub token: String,
    #[serde(deserialize_with = "timefmt::deserialize")]
    pub expires_at: DateTime<Utc>,
    pub summary: ScanSummary,
}

impl ScanToken {
    /// Display-only; the backend decides whether the token is still honored.
    pub fn looks_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }
}

/// Scan token lookup (`GET /scan/{token}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanContext {
    pub token: String,
    #[serde(rename = "log_file_id")]
    pub file_id: String,
    pub summary: ScanSummary,
    #[serde(deserialize_with = "timefmt::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timefmt::deserialize")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePreview {
    pub content: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeRow {
    pub status: DecodeStatus,
    #[serde(rename = "devaddr", default)]
    pub device_addr: Option<String>,
    #[serde(rename = "fcnt", default)]
    pub frame_counter: Option<u32>,
    #[serde(rename = "fport", default)]
    pub port: Option<u8>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub payload_hex: Option<String>,
    #[serde(rename = "decoded_json", default)]
    pub decoded_payload: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Rows of one decode submission, keyed by their own decode token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeResultSet {
    pub token: String,
    #[serde(default, deserialize_with = "timefmt::deserialize_opt")]
    pub expires_at: Option<DateTime<Utc>>,
    pub rows: Vec<DecodeRow>,
}

impl DecodeResultSet {
    pub fn ok_count(&self) -> usize { self.rows.iter().filter(|r| r.status == DecodeStatus::Ok).count() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayStatus {
    Sent,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRow {
    pub status: ReplayStatus,
    #[serde(rename = "gateway_eui", default)]
    pub gateway_id: Option<String>,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub size: Option<u64>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayJob {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    pub rows: Vec<ReplayRow>,
}

impl ReplayJob {
    pub fn sent_count(&self) -> usize { self.rows.iter().filter(|r| r.status == ReplayStatus::Sent).count() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn default_filename(&self) -> String { format!("decode-results.{}", self.as_str()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn naive_and_rfc3339_timestamps() {
        let a = timefmt::parse("2025-01-01T00:00:00.123456").unwrap();
        let b = timefmt::parse("2025-01-01T00:00:00.123456+00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(timefmt::parse("2025-01-01T10:00:00Z").unwrap(), Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap());
        assert!(timefmt::parse("yesterday").is_none());
    }

    #[test]
    fn decode_row_requires_status() {
        let ok: DecodeRow = serde_json::from_value(serde_json::json!({
            "status": "ok", "devaddr": "26011BDA", "fcnt": 3, "fport": null, "time": "2025-01-01T00:00:00Z",
            "payload_hex": "0101", "decoded_json": null, "error": null
        })).unwrap();
        assert_eq!(ok.status, DecodeStatus::Ok);
        assert_eq!(ok.frame_counter, Some(3));
        assert!(serde_json::from_value::<DecodeRow>(serde_json::json!({"devaddr": "X"})).is_err());
        assert!(serde_json::from_value::<DecodeRow>(serde_json::json!({"status": "pending"})).is_err());
    }

    #[test]
    fn log_file_wire_names() {
        let f: LogFile = serde_json::from_value(serde_json::json!({
            "id": "f1", "original_filename": "gen.jsonl", "size_bytes": 1234,
            "uploaded_at": "2025-03-04T05:06:07", "source_type": "generated", "metadata_json": null
        })).unwrap();
        assert_eq!(f.filename, "gen.jsonl");
        assert_eq!(f.source_type, SourceType::Generated);
    }

    #[test]
    fn export_format_names() {
        assert_eq!(ExportFormat::parse("CSV"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::Json.default_filename(), "decode-results.json");
        assert_eq!(ExportFormat::parse("xml"), None);
    }
}
