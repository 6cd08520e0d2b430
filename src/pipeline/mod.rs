//! Log-file pipeline: upload or generate, scan, then decode or replay.

mod generate;
mod models;
mod orchestrator;
mod state;

pub use generate::{GenerateRequest, GeneratorPreset, MAX_FRAMES, MAX_INTERVAL_SECS, MIN_FREQUENCY_MHZ};
pub(crate) use generate::{is_hex, strip_separators};
pub(crate) use models::timefmt;
pub use models::{
    DecodeResultSet, DecodeRow, DecodeStatus, ExportFormat, FilePreview, LogFile, ReplayJob, ReplayRow, ReplayStatus,
    ScanContext, ScanSummary, ScanToken, SourceType,
};
pub use orchestrator::{parse_device_filter, DecodeRequest, Pipeline, ReplayRequest, DEFAULT_REPLAY_HOST, DEFAULT_REPLAY_PORT, RAW_DECODER};
pub use state::FileScanState;
