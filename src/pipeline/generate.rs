use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, ConsoleResult};

pub const MAX_FRAMES: u32 = 10_000;
pub const MAX_INTERVAL_SECS: u32 = 3_600;
pub const MIN_FREQUENCY_MHZ: f64 = 1.0;

/// Drop the separators operators paste in hex values (space, `:`, `-`).
pub(crate) fn strip_separators(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, ' ' | ':' | '-')).collect::<String>().trim().to_string()
}

pub(crate) fn is_hex(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Synthetic log generation parameters (`POST /files/generate`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "gateway_eui")]
    pub gateway_id: String,
    #[serde(rename = "devaddr")]
    pub device_addr: String,
    pub frames: u32,
    pub interval_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub frequency_mhz: f64,
    pub datarate: String,
    pub coding_rate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            gateway_id: "0102030405060708".into(),
            device_addr: "26011BDA".into(),
            frames: 100,
            interval_seconds: 10,
            start_time: None,
            frequency_mhz: 868.3,
            datarate: "SF7BW125".into(),
            coding_rate: "4/5".into(),
            payload_hex: None,
            filename: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorPreset {
    Heartbeat,
    Gps,
    Sensor,
    Empty,
}

impl GeneratorPreset {
    pub const ALL: [GeneratorPreset; 4] = [GeneratorPreset::Heartbeat, GeneratorPreset::Gps, GeneratorPreset::Sensor, GeneratorPreset::Empty];

    pub fn name(&self) -> &'static str {
        match self {
            GeneratorPreset::Heartbeat => "heartbeat",
            GeneratorPreset::Gps => "gps",
            GeneratorPreset::Sensor => "sensor",
            GeneratorPreset::Empty => "empty",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.name() == s)
    }

    /// Preset applied over the defaults; gateway and device stay as given.
    pub fn apply(&self, mut req: GenerateRequest) -> GenerateRequest {
        let (frames, interval, payload, datarate, freq) = match self {
            GeneratorPreset::Heartbeat => (60, 60, Some("0101"), "SF7BW125", 868.1),
            GeneratorPreset::Gps => (30, 120, Some("88E1F2C4010AF3B2"), "SF9BW125", 868.5),
            GeneratorPreset::Sensor => (200, 5, Some("0A0B0C0D0E0F"), "SF7BW125", 868.3),
            GeneratorPreset::Empty => (20, 30, None, "SF8BW125", 868.1),
        };
        req.frames = frames;
        req.interval_seconds = interval;
        req.payload_hex = payload.map(str::to_string);
        req.datarate = datarate.to_string();
        req.frequency_mhz = freq;
        req
    }
}

impl GenerateRequest {
    pub fn from_preset(preset: GeneratorPreset) -> Self { preset.apply(Self::default()) }

    /// Range and format checks the backend would otherwise reject with a 4xx.
    pub fn validate(&self) -> ConsoleResult<()> {
        if !(1..=MAX_FRAMES).contains(&self.frames) {
            return Err(ConsoleError::invalid(format!("frames must be between 1 and {}", MAX_FRAMES)));
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.interval_seconds) {
            return Err(ConsoleError::invalid(format!("interval must be between 1 and {} seconds", MAX_INTERVAL_SECS)));
        }
        if !self.frequency_mhz.is_finite() || self.frequency_mhz < MIN_FREQUENCY_MHZ {
            return Err(ConsoleError::invalid("frequency must be at least 1.0 MHz"));
        }
        if self.gateway_id.trim().is_empty() {
            return Err(ConsoleError::invalid("gateway id is required"));
        }
        let addr = strip_separators(&self.device_addr);
        if addr.len() != 8 || !is_hex(&addr) {
            return Err(ConsoleError::invalid("DevAddr must be 4 bytes (8 hex chars)"));
        }
        if let Some(payload) = self.payload_hex.as_deref() {
            let p = strip_separators(payload);
            if !is_hex(&p) || p.len() % 2 != 0 {
                return Err(ConsoleError::invalid("Payload hex must be byte-aligned"));
            }
        }
        Ok(())
    }

    /// Blank optional strings are sent as absent.
    pub(crate) fn normalized(mut self) -> Self {
        self.payload_hex = self.payload_hex.filter(|p| !p.trim().is_empty());
        self.filename = self.filename.filter(|f| !f.trim().is_empty());
        self
    }
}
