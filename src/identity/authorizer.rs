use crate::error::{ConsoleError, ConsoleResult};

use super::principal::{Identity, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Files, Decode, Replay, Decoders, Devices pages and their read calls.
    ViewOperational,
    /// Upload, generate, delete, scan, decode, replay, device/decoder create & delete.
    Mutate,
    /// User CRUD and the audit trail.
    Administer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub view: bool,
    pub mutate: bool,
    pub administer: bool,
}

impl CapabilitySet {
    pub fn allows(&self, cap: Capability) -> bool {
        match cap {
            Capability::ViewOperational => self.view,
            Capability::Mutate => self.mutate,
            Capability::Administer => self.administer,
        }
    }
}

/// Every operation a view can invoke through the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListFiles,
    PreviewFile,
    DownloadFile,
    UploadFile,
    GenerateFile,
    DeleteFile,
    ScanFile,
    LookupScan,
    Decode,
    ExportDecode,
    Replay,
    LookupReplay,
    ListDecoders,
    ViewDecoderSource,
    UploadDecoder,
    DeleteDecoder,
    ListDevices,
    CreateDevice,
    DeleteDevice,
    ManageUsers,
    ViewAudit,
}

impl Operation {
    pub fn required(&self) -> Capability {
        use Operation::*;
        match self {
            ListFiles | PreviewFile | DownloadFile | LookupScan | ExportDecode | LookupReplay
            | ListDecoders | ViewDecoderSource | ListDevices => Capability::ViewOperational,
            UploadFile | GenerateFile | DeleteFile | ScanFile | Decode | Replay | UploadDecoder
            | DeleteDecoder | CreateDevice | DeleteDevice => Capability::Mutate,
            ManageUsers | ViewAudit => Capability::Administer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Start,
    Files,
    Decode,
    Replay,
    Decoders,
    Devices,
    Admin,
    About,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Start => "/",
            Route::Files => "/files",
            Route::Decode => "/decode",
            Route::Replay => "/replay",
            Route::Decoders => "/decoders",
            Route::Devices => "/devices",
            Route::Admin => "/admin",
            Route::About => "/about",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let p = path.split(['?', '#']).next().unwrap_or("");
        let p = p.trim_end_matches('/');
        [Route::Login, Route::Files, Route::Decode, Route::Replay, Route::Decoders, Route::Devices, Route::Admin, Route::About]
            .into_iter()
            .find(|r| r.path() == p)
            .or(if p.is_empty() { Some(Route::Start) } else { None })
    }

    /// `None` means reachable without an identity.
    pub fn required(&self) -> Option<Capability> {
        match self {
            Route::Login => None,
            Route::Admin => Some(Capability::Administer),
            _ => Some(Capability::ViewOperational),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(Route),
}

/// Capability set for an identity. Inactive or absent identities get nothing.
pub fn capabilities_for(identity: Option<&Identity>) -> CapabilitySet {
    match identity {
        Some(id) if id.active => match id.role {
            Role::Admin => CapabilitySet { view: true, mutate: true, administer: true },
            Role::Editor => CapabilitySet { view: true, mutate: true, administer: false },
            Role::Viewer => CapabilitySet { view: true, mutate: false, administer: false },
        },
        _ => CapabilitySet::default(),
    }
}

pub fn is_allowed(identity: Option<&Identity>, op: Operation) -> bool {
    capabilities_for(identity).allows(op.required())
}

/// Gate an operation before any request is issued.
pub fn authorize(identity: Option<&Identity>, op: Operation) -> ConsoleResult<()> {
    if is_allowed(identity, op) { return Ok(()); }
    let who = match identity {
        Some(id) if id.active => id.role.as_str(),
        _ => "anonymous session",
    };
    Err(ConsoleError::forbidden(format!("{:?} is not permitted for {}", op, who)))
}

/// Unauthenticated sessions land on Login; authenticated ones missing the
/// capability land on Start.
pub fn resolve_route(identity: Option<&Identity>, route: Route) -> RouteDecision {
    let Some(required) = route.required() else { return RouteDecision::Allow; };
    let caps = capabilities_for(identity);
    if caps.allows(required) {
        RouteDecision::Allow
    } else if !caps.view {
        RouteDecision::Redirect(Route::Login)
    } else {
        RouteDecision::Redirect(Route::Start)
    }
}
