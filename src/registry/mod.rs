//! Administrative registry: users, device credentials, decoders and the audit trail.
//! Each concern adds its own `impl Registry` block.

mod audit;
mod decoders;
mod devices;
mod users;

use crate::gateway::ApiClient;

pub use audit::{AuditEvent, AuditQuery};
pub use decoders::{Decoder, DecoderKind, DecoderUpload, BUILTIN_PREFIX};
pub use devices::{normalize_device_addr, normalize_session_key, DeviceCredential, NewDevice};
pub use users::{AdminUser, NewUser, PasswordChange, UserEdit, MIN_PASSWORD_LEN};

pub struct Registry {
    client: ApiClient,
}

impl Registry {
    pub fn new(client: ApiClient) -> Self { Self { client } }

    pub fn client(&self) -> &ApiClient { &self.client }
}
