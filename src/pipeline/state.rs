use super::models::ScanToken;

/// Scan state of one log file. Files are independent of each other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileScanState {
    #[default]
    Unscanned,
    Scanned { token: ScanToken },
}

impl FileScanState {
    /// A new scan always replaces the active token; older tokens stay valid
    /// on the backend but are no longer handed off from here.
    pub fn on_scanned(self, token: ScanToken) -> Self {
        FileScanState::Scanned { token }
    }

    /// The backend rejected `rejected`. Only the file whose active token it
    /// is falls back to `Unscanned`.
    pub fn on_token_rejected(self, rejected: &str) -> Self {
        match self {
            FileScanState::Scanned { token } if token.token == rejected => FileScanState::Unscanned,
            other => other,
        }
    }

    pub fn active_token(&self) -> Option<&ScanToken> {
        match self {
            FileScanState::Scanned { token } => Some(token),
            FileScanState::Unscanned => None,
        }
    }
}
