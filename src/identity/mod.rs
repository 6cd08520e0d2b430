//! Session lifecycle and role-derived access control.
//! Keep the public surface thin and split implementation across sub-modules.

mod authorizer;
mod principal;
mod session;
mod store;

pub use authorizer::{authorize, capabilities_for, is_allowed, resolve_route, Capability, CapabilitySet, Operation, Route, RouteDecision};
pub use principal::{Identity, Role};
pub use session::{SessionContext, SessionSnapshot, SessionStatus};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, CREDENTIAL_KEY};
