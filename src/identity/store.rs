use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

/// Fixed key the credential is stored under.
pub const CREDENTIAL_KEY: &str = "lp0_auth_token";

/// Durable home of the single bearer credential.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, credential: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// JSON key/value file; other keys in the file are preserved.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() { return Ok(HashMap::new()); }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading credential file {}", self.path.display()))?;
        if text.trim().is_empty() { return Ok(HashMap::new()); }
        serde_json::from_str(&text).with_context(|| format!("parsing credential file {}", self.path.display()))
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let text = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, text).with_context(|| format!("writing credential file {}", self.path.display()))?;
        restrict_permissions(&self.path);
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!("could not restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.read_map()?.remove(CREDENTIAL_KEY).filter(|v| !v.trim().is_empty()))
    }

    fn save(&self, credential: &str) -> Result<()> {
        // an unreadable file is replaced rather than blocking the save
        let mut map = self.read_map().unwrap_or_default();
        map.insert(CREDENTIAL_KEY.to_string(), credential.to_string());
        self.write_map(&map)
    }

    fn clear(&self) -> Result<()> {
        if !self.path.exists() { return Ok(()); }
        let mut map = self.read_map().unwrap_or_default();
        map.remove(CREDENTIAL_KEY);
        self.write_map(&map)
    }
}

/// Process-local store, for tests and `UPLINK_CREDENTIAL_FILE`-less embedding.
#[derive(Default)]
pub struct MemoryCredentialStore {
    value: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn with(credential: &str) -> Self { Self { value: Mutex::new(Some(credential.to_string())) } }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>> { Ok(self.value.lock().clone()) }
    fn save(&self, credential: &str) -> Result<()> { *self.value.lock() = Some(credential.to_string()); Ok(()) }
    fn clear(&self) -> Result<()> { *self.value.lock() = None; Ok(()) }
}
