use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{ConsoleError, ConsoleResult};
use crate::gateway::{segment, ApiRequest};
use crate::identity::Operation;
use crate::pipeline::{is_hex, strip_separators};

use super::Registry;

/// ABP session keys for one device address. Created and deleted, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredential {
    pub id: String,
    #[serde(rename = "devaddr")]
    pub device_addr: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(rename = "nwkskey")]
    pub network_session_key: String,
    #[serde(rename = "appskey")]
    pub app_session_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDevice {
    #[serde(rename = "devaddr")]
    pub device_addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(rename = "nwkskey")]
    pub network_session_key: String,
    #[serde(rename = "appskey")]
    pub app_session_key: String,
}

fn normalize_hex(value: &str, len: usize, label: &str) -> ConsoleResult<String> {
    let cleaned = strip_separators(value).to_ascii_uppercase();
    if cleaned.len() != len {
        return Err(ConsoleError::invalid(format!("{} must be {} hex characters", label, len)));
    }
    if !is_hex(&cleaned) {
        return Err(ConsoleError::invalid(format!("{} must be hex", label)));
    }
    Ok(cleaned)
}

pub fn normalize_device_addr(value: &str) -> ConsoleResult<String> { normalize_hex(value, 8, "DevAddr") }

pub fn normalize_session_key(value: &str, label: &str) -> ConsoleResult<String> { normalize_hex(value, 32, label) }

impl NewDevice {
    fn normalized(self) -> ConsoleResult<Self> {
        Ok(Self {
            device_addr: normalize_device_addr(&self.device_addr)?,
            device_name: self.device_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            network_session_key: normalize_session_key(&self.network_session_key, "NwkSKey")?,
            app_session_key: normalize_session_key(&self.app_session_key, "AppSKey")?,
        })
    }
}

impl Registry {
    pub async fn list_devices(&self, cancel: &CancellationToken) -> ConsoleResult<Vec<DeviceCredential>> {
        self.client.authorize(Operation::ListDevices)?;
        self.client.json(&ApiRequest::get("/devices").label("Devices load"), cancel).await
    }

    pub async fn create_device(&self, device: NewDevice, cancel: &CancellationToken) -> ConsoleResult<DeviceCredential> {
        self.client.authorize(Operation::CreateDevice)?;
        let device = device.normalized()?;
        let req = ApiRequest::post("/devices").label("Create device").json(&device)?;
        let created: DeviceCredential = self.client.json(&req, cancel).await?;
        info!(devaddr = %created.device_addr, "registry: device credential created");
        Ok(created)
    }

    pub async fn delete_device(&self, device_id: &str, cancel: &CancellationToken) -> ConsoleResult<()> {
        self.client.authorize(Operation::DeleteDevice)?;
        let req = ApiRequest::delete(format!("/devices/{}", segment(device_id))).label("Delete device");
        self.client.unit(&req, cancel).await
    }
}
