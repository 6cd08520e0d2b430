//! In-process LP0 backend for integration tests. Implements `Transport`, so the
//! console under test runs its real gateway, session and pipeline code.
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

use uplink_console::gateway::{ApiRequest, ApiResponse, Gateway, RequestBody, Transport, Verb};
use uplink_console::identity::MemoryCredentialStore;
use uplink_console::{tprintln, Console, ConsoleResult};

pub const ADMIN: (&str, &str) = ("admin@lp0.test", "admin-password");
pub const EDITOR: (&str, &str) = ("editor@lp0.test", "editor-password");
pub const VIEWER: (&str, &str) = ("viewer@lp0.test", "viewer-password");

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

struct UserRec {
    id: String,
    email: String,
    password: String,
    role: String,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl UserRec {
    fn me(&self) -> Value {
        json!({"id": self.id, "email": self.email, "role": self.role, "is_active": self.active})
    }
    fn admin_view(&self) -> Value {
        json!({"id": self.id, "email": self.email, "role": self.role, "is_active": self.active,
               "created_at": self.created_at, "updated_at": self.updated_at})
    }
}

struct FileRec {
    id: String,
    name: String,
    bytes: Vec<u8>,
    source: &'static str,
    uploaded_at: String,
    metadata: Value,
}

impl FileRec {
    fn view(&self) -> Value {
        json!({"id": self.id, "original_filename": self.name, "size_bytes": self.bytes.len(),
               "uploaded_at": self.uploaded_at, "source_type": self.source, "metadata_json": self.metadata})
    }
}

struct ScanRec {
    file_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    summary: Value,
}

#[derive(Default)]
struct State {
    seq: u64,
    users: Vec<UserRec>,
    tokens: HashMap<String, String>,
    files: Vec<FileRec>,
    scans: HashMap<String, ScanRec>,
    decodes: HashMap<String, Vec<Value>>,
    devices: Vec<Value>,
    decoders: Vec<(Value, String)>,
    audit: Vec<Value>,
    replays: HashMap<String, Value>,
}

impl State {
    fn next(&mut self, prefix: &str) -> String {
        self.seq += 1;
        format!("{}-{}", prefix, self.seq)
    }

    fn audit(&mut self, actor: Option<(&str, &str)>, action: &str, payload: Value) {
        let id = self.next("evt");
        self.audit.push(json!({
            "id": id, "user_id": actor.map(|a| a.0), "user_email": actor.map(|a| a.1),
            "action": action, "detail": null, "payload_json": payload, "created_at": naive_now()
        }));
    }
}

fn naive_now() -> String { Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string() }

fn reply(status: u16, body: Value) -> ApiResponse {
    ApiResponse { status, content_type: Some("application/json".into()), body: body.to_string().into_bytes(), ..Default::default() }
}

fn detail(status: u16, msg: &str) -> ApiResponse { reply(status, json!({"detail": msg})) }

fn hex(bytes: &[u8]) -> String { bytes.iter().map(|b| format!("{:02X}", b)).collect() }

fn unhex(s: &str) -> Vec<u8> {
    (0..s.len() / 2).filter_map(|i| u8::from_str_radix(&s[2 * i..2 * i + 2], 16).ok()).collect()
}

/// JSONL uplink log in the gateway forwarder format.
pub fn generate_lines(gateway: &str, devaddr: &str, frames: u32, interval: u32, freq: f64, datarate: &str, payload_hex: Option<&str>) -> String {
    let mut addr = unhex(devaddr);
    addr.reverse();
    let payload = payload_hex.map(unhex).unwrap_or_default();
    let start = Utc::now();
    let mut out = String::new();
    for i in 0..frames {
        let fcnt = (i & 0xFFFF) as u16;
        let mut phy = vec![0x40];
        phy.extend_from_slice(&addr);
        phy.extend_from_slice(&fcnt.to_le_bytes());
        phy.extend_from_slice(&payload);
        let ts = start + Duration::seconds(i as i64 * interval as i64);
        let line = json!({
            "gatewayEui": gateway,
            "rxpk": {
                "time": ts.format("%Y-%m-%dT%H:%M:%SZ").to_string(), "tmst": 1_000_000 + i * 1000,
                "freq": freq, "chan": 0, "rfch": 0, "stat": 1, "modu": "LORA", "datr": datarate, "codr": "4/5",
                "rssi": -60 - (i % 20) as i64, "lsnr": 5.5 - (i % 10) as f64 * 0.1, "size": phy.len(), "data": B64.encode(&phy)
            }
        });
        out.push_str(&line.to_string());
        out.push('\n');
    }
    out
}

struct Frame {
    gateway: String,
    freq: f64,
    time: String,
    phy: Vec<u8>,
}

impl Frame {
    fn devaddr(&self) -> Option<String> {
        let mut a = self.phy.get(1..5)?.to_vec();
        a.reverse();
        Some(hex(&a))
    }
}

fn frames(bytes: &[u8]) -> Vec<Frame> {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter_map(|l| serde_json::from_str::<Value>(l).ok())
        .filter_map(|v| {
            let rx = v.get("rxpk")?;
            Some(Frame {
                gateway: v.get("gatewayEui")?.as_str()?.to_string(),
                freq: rx.get("freq")?.as_f64()?,
                time: rx.get("time").and_then(Value::as_str).unwrap_or_default().to_string(),
                phy: B64.decode(rx.get("data")?.as_str()?).ok()?,
            })
        })
        .collect()
}

/// Call log entry: `"<VERB> <path>"`.
pub type CallKey = String;

pub struct FakeBackend {
    state: Mutex<State>,
    calls: Mutex<Vec<CallKey>>,
    gates: Mutex<HashMap<CallKey, Arc<Notify>>>,
    /// Notified whenever a held call reaches its gate.
    pub entered: Notify,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        let backend = Self { state: Mutex::new(State::default()), calls: Mutex::new(vec![]), gates: Mutex::new(HashMap::new()), entered: Notify::new() };
        {
            let mut st = backend.state.lock();
            for ((email, password), role) in [(ADMIN, "admin"), (EDITOR, "editor"), (VIEWER, "viewer")] {
                let id = st.next("user");
                st.users.push(UserRec {
                    id, email: email.into(), password: password.into(), role: role.into(), active: true,
                    created_at: naive_now(), updated_at: naive_now(),
                });
            }
            let source = "function decodeUplink(input) { return { data: { bytes: input.bytes } }; }\n".to_string();
            st.decoders.push((json!({"id": "builtin:bytes.js", "name": "bytes.js", "kind": "builtin", "size_bytes": source.len(), "uploaded_at": null}), source));
        }
        Arc::new(backend)
    }

    /// Console wired to this backend with an in-memory credential store.
    pub fn console(self: &Arc<Self>) -> Console {
        Console::new(Gateway::new(self.clone()), Arc::new(MemoryCredentialStore::default()))
    }

    /// Issue a bearer credential for `email` without going through login.
    pub fn issue_token(&self, email: &str) -> String {
        let mut st = self.state.lock();
        let uid = st.users.iter().find(|u| u.email == email).map(|u| u.id.clone()).unwrap_or_default();
        let tok = st.next("tok");
        st.tokens.insert(tok.clone(), uid);
        tok
    }

    pub fn revoke_all_tokens(&self) { self.state.lock().tokens.clear(); }

    /// Make every outstanding scan token expire now.
    pub fn expire_scans(&self) {
        for s in self.state.lock().scans.values_mut() {
            s.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    pub fn calls(&self) -> Vec<CallKey> { self.calls.lock().clone() }

    pub fn count(&self, key: &str) -> usize { self.calls.lock().iter().filter(|c| c.as_str() == key).count() }

    pub fn clear_calls(&self) { self.calls.lock().clear(); }

    /// Park calls matching `key` until the returned handle is notified.
    pub fn hold(&self, key: &str) -> Arc<Notify> {
        let n = Arc::new(Notify::new());
        self.gates.lock().insert(key.to_string(), n.clone());
        n
    }

    /// Let later calls to `key` through; calls already parked stay parked.
    pub fn stop_holding(&self, key: &str) { self.gates.lock().remove(key); }

    pub fn release(&self, key: &str) {
        if let Some(n) = self.gates.lock().remove(key) {
            n.notify_one();
        }
    }

    fn route(&self, request: &ApiRequest, bearer: Option<&str>) -> ApiResponse {
        let segs: Vec<String> = request
            .path
            .trim_start_matches('/')
            .split('/')
            .map(|s| urlencoding::decode(s).map(|c| c.into_owned()).unwrap_or_else(|_| s.to_string()))
            .collect();
        let segs: Vec<&str> = segs.iter().map(String::as_str).collect();
        let body = match &request.body {
            RequestBody::Json(v) => v.clone(),
            _ => Value::Null,
        };
        let mut st = self.state.lock();

        match (request.verb, segs.as_slice()) {
            (Verb::Get, ["health"]) => return reply(200, json!({"status": "ok"})),
            (Verb::Post, ["auth", "login"]) => {
                let email = body["email"].as_str().unwrap_or_default().trim().to_lowercase();
                let password = body["password"].as_str().unwrap_or_default();
                let Some(uid) = st.users.iter().find(|u| u.email == email && u.password == password && u.active).map(|u| u.id.clone()) else {
                    return detail(401, "Invalid credentials");
                };
                let tok = st.next("tok");
                st.tokens.insert(tok.clone(), uid.clone());
                st.audit(Some((&uid, &email)), "auth.login", json!({}));
                return reply(200, json!({"access_token": tok, "token_type": "bearer"}));
            }
            _ => {}
        }

        // everything else needs a live bearer
        let Some(user) = bearer
            .and_then(|b| st.tokens.get(b))
            .and_then(|uid| st.users.iter().find(|u| &u.id == uid))
            .filter(|u| u.active)
            .map(|u| (u.id.clone(), u.email.clone(), u.role.clone()))
        else {
            return detail(401, "Invalid token");
        };
        let (uid, email, role) = user;
        let actor = Some((uid.as_str(), email.as_str()));
        let can_mutate = role == "admin" || role == "editor";
        let is_admin = role == "admin";
        let forbidden = || detail(403, "Insufficient permissions");

        match (request.verb, segs.as_slice()) {
            (Verb::Get, ["auth", "me"]) => {
                let me = st.users.iter().find(|u| u.id == uid).map(UserRec::me).unwrap_or(Value::Null);
                reply(200, me)
            }
            (Verb::Get, ["files"]) => reply(200, Value::Array(st.files.iter().rev().map(FileRec::view).collect())),
            (Verb::Post, ["files", "upload"]) => {
                if !can_mutate { return forbidden(); }
                let RequestBody::Multipart { filename, bytes, .. } = &request.body else { return detail(422, "upload missing"); };
                let id = st.next("file");
                let rec = FileRec { id, name: filename.clone(), bytes: bytes.clone(), source: "uploaded", uploaded_at: naive_now(), metadata: Value::Null };
                let view = rec.view();
                st.files.push(rec);
                st.audit(actor, "files.upload", json!({"filename": filename}));
                reply(200, view)
            }
            (Verb::Post, ["files", "generate"]) => {
                if !can_mutate { return forbidden(); }
                let lines = generate_lines(
                    body["gateway_eui"].as_str().unwrap_or("0102030405060708"),
                    body["devaddr"].as_str().unwrap_or("26011BDA"),
                    body["frames"].as_u64().unwrap_or(100) as u32,
                    body["interval_seconds"].as_u64().unwrap_or(10) as u32,
                    body["frequency_mhz"].as_f64().unwrap_or(868.3),
                    body["datarate"].as_str().unwrap_or("SF7BW125"),
                    body["payload_hex"].as_str(),
                );
                let id = st.next("file");
                let name = body["filename"].as_str().map(str::to_string).unwrap_or_else(|| format!("generated-{}.jsonl", id));
                let rec = FileRec { id, name, bytes: lines.into_bytes(), source: "generated", uploaded_at: naive_now(), metadata: json!({"generator": body}) };
                let view = rec.view();
                st.files.push(rec);
                st.audit(actor, "files.generate", json!({}));
                reply(200, view)
            }
            (Verb::Get, ["files", id]) => match st.files.iter().find(|f| f.id == *id) {
                Some(f) => reply(200, f.view()),
                None => detail(404, "File not found"),
            },
            (Verb::Get, ["files", id, "preview"]) => match st.files.iter().find(|f| f.id == *id) {
                Some(f) => reply(200, json!({"content": String::from_utf8_lossy(&f.bytes), "truncated": false})),
                None => detail(404, "File not found"),
            },
            (Verb::Get, ["files", id, "download"]) => match st.files.iter().find(|f| f.id == *id) {
                Some(f) => ApiResponse {
                    status: 200,
                    content_type: Some("application/octet-stream".into()),
                    content_disposition: Some(format!("attachment; filename=\"{}\"", f.name)),
                    body: f.bytes.clone(),
                },
                None => detail(404, "File not found"),
            },
            (Verb::Delete, ["files", id]) => {
                if !can_mutate { return forbidden(); }
                let before = st.files.len();
                st.files.retain(|f| f.id != *id);
                if st.files.len() == before { return detail(404, "File not found"); }
                st.audit(actor, "files.delete", json!({"id": id}));
                reply(200, json!({"status": "deleted"}))
            }
            (Verb::Post, ["files", id, "scan"]) => {
                if !can_mutate { return forbidden(); }
                let Some(f) = st.files.iter().find(|f| f.id == *id) else { return detail(404, "File not found"); };
                let fr = frames(&f.bytes);
                let gateways: BTreeSet<String> = fr.iter().map(|x| x.gateway.clone()).collect();
                let devaddrs: BTreeSet<String> = fr.iter().filter_map(Frame::devaddr).collect();
                let summary = json!({"record_count": fr.len(), "gateway_euis": gateways, "devaddrs": devaddrs});
                let token = st.next("scan");
                let now = Utc::now();
                st.scans.insert(token.clone(), ScanRec { file_id: id.to_string(), created_at: now, expires_at: now + Duration::minutes(30), summary: summary.clone() });
                reply(200, json!({"token": token, "expires_at": (now + Duration::minutes(30)).to_rfc3339(), "summary": summary}))
            }
            (Verb::Get, ["scan", token]) => match st.scans.get(*token).filter(|s| s.expires_at > Utc::now()) {
                Some(s) => reply(200, json!({"token": token, "log_file_id": s.file_id, "summary": s.summary,
                                              "created_at": s.created_at.to_rfc3339(), "expires_at": s.expires_at.to_rfc3339()})),
                None => detail(404, "Scan token expired or missing"),
            },
            (Verb::Post, ["decode"]) => {
                if !can_mutate { return forbidden(); }
                let token = body["scan_token"].as_str().unwrap_or_default();
                let Some(file_id) = st.scans.get(token).filter(|s| s.expires_at > Utc::now()).map(|s| s.file_id.clone()) else {
                    return detail(404, "Scan token expired");
                };
                let decoder = body["decoder_id"].as_str().unwrap_or("raw").to_string();
                if decoder != "raw" && !st.decoders.iter().any(|(d, _)| d["id"] == decoder.as_str()) {
                    return detail(404, "Decoder not found");
                }
                let Some(f) = st.files.iter().find(|f| f.id == file_id) else { return detail(404, "File not found"); };
                let filter: Option<Vec<String>> = body["devaddrs"].as_array().map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_uppercase)).collect());
                let keyed: BTreeSet<String> = st.devices.iter().filter_map(|d| d["devaddr"].as_str().map(str::to_string)).collect();
                let rows: Vec<Value> = frames(&f.bytes)
                    .iter()
                    .filter(|fr| match (&filter, fr.devaddr()) {
                        (Some(allowed), Some(a)) => allowed.contains(&a),
                        _ => true,
                    })
                    .map(|fr| {
                        let addr = fr.devaddr();
                        let fcnt = fr.phy.get(5..7).map(|b| u16::from_le_bytes([b[0], b[1]]));
                        let payload = fr.phy.get(7..).map(hex).unwrap_or_default();
                        let decoded = if decoder == "raw" { Value::Null } else { json!({"bytes": payload}) };
                        match addr.as_ref().filter(|a| keyed.contains(*a)) {
                            Some(_) => json!({"status": "ok", "devaddr": addr, "fcnt": fcnt, "fport": null, "time": fr.time,
                                              "payload_hex": payload, "decoded_json": decoded, "error": null}),
                            None => json!({"status": "error", "devaddr": addr, "fcnt": fcnt, "fport": null, "time": fr.time,
                                           "payload_hex": null, "decoded_json": null, "error": "Missing device keys"}),
                        }
                    })
                    .collect();
                let dtok = st.next("decode");
                st.decodes.insert(dtok.clone(), rows.clone());
                reply(200, json!({"token": dtok, "expires_at": (Utc::now() + Duration::minutes(30)).to_rfc3339(), "rows": rows}))
            }
            (Verb::Get, ["decode", token, "export", fmt]) => {
                let Some(rows) = st.decodes.get(*token) else { return detail(404, "Decode token expired"); };
                let (ctype, body) = match *fmt {
                    "json" => ("application/json", Value::Array(rows.clone()).to_string()),
                    "csv" => {
                        let mut s = String::from("status,devaddr,fcnt,fport,time,payload_hex,decoded_json,error\n");
                        for r in rows {
                            let cell = |k: &str| match &r[k] { Value::Null => String::new(), Value::String(x) => x.clone(), other => other.to_string() };
                            s.push_str(&["status", "devaddr", "fcnt", "fport", "time", "payload_hex", "decoded_json", "error"].map(cell).join(","));
                            s.push('\n');
                        }
                        ("text/csv", s)
                    }
                    _ => return detail(404, "Not Found"),
                };
                ApiResponse {
                    status: 200,
                    content_type: Some(ctype.into()),
                    content_disposition: Some(format!("attachment; filename=decode-{}.{}", token, fmt)),
                    body: body.into_bytes(),
                }
            }
            (Verb::Post, ["replay"]) => {
                if !can_mutate { return forbidden(); }
                let token = body["scan_token"].as_str().unwrap_or_default();
                let Some(file_id) = st.scans.get(token).filter(|s| s.expires_at > Utc::now()).map(|s| s.file_id.clone()) else {
                    return detail(404, "Scan token expired");
                };
                let port = body["udp_port"].as_u64().unwrap_or(0);
                if !(1..=65535).contains(&port) { return detail(422, "udp_port out of range"); }
                let host = body["udp_host"].as_str().unwrap_or_default().to_string();
                let Some(f) = st.files.iter().find(|f| f.id == file_id) else { return detail(404, "File not found"); };
                let rows: Vec<Value> = frames(&f.bytes)
                    .iter()
                    .map(|fr| json!({"status": "sent", "gateway_eui": fr.gateway, "frequency": fr.freq, "size": fr.phy.len(),
                                     "message": format!("sent to {}:{}", host, port)}))
                    .collect();
                let id = st.next("replay");
                let job = json!({"id": id, "status": "completed", "rows": rows});
                st.replays.insert(id, job.clone());
                reply(200, job)
            }
            (Verb::Get, ["replay", id]) => match st.replays.get(*id) {
                Some(j) => reply(200, j.clone()),
                None => detail(404, "Replay job not found"),
            },
            (Verb::Get, ["decoders"]) => reply(200, Value::Array(st.decoders.iter().map(|(d, _)| d.clone()).collect())),
            (Verb::Get, ["decoders", id]) => match st.decoders.iter().find(|(d, _)| d["id"] == *id) {
                Some((d, _)) => reply(200, d.clone()),
                None => detail(404, "Decoder not found"),
            },
            (Verb::Get, ["decoders", id, "source"]) => match st.decoders.iter().find(|(d, _)| d["id"] == *id) {
                Some((_, src)) => ApiResponse { status: 200, content_type: Some("text/plain".into()), body: src.clone().into_bytes(), ..Default::default() },
                None => detail(404, "Decoder not found"),
            },
            (Verb::Post, ["decoders", "upload"]) => {
                if !can_mutate { return forbidden(); }
                let RequestBody::Multipart { filename, bytes, .. } = &request.body else { return detail(422, "upload missing"); };
                let id = st.next("decoder");
                let src = String::from_utf8_lossy(bytes).into_owned();
                st.decoders.push((json!({"id": id, "name": filename, "kind": "uploaded", "size_bytes": bytes.len(), "uploaded_at": naive_now()}), src));
                reply(200, json!({"id": id, "name": filename, "size_bytes": bytes.len()}))
            }
            (Verb::Delete, ["decoders", id]) => {
                if !can_mutate { return forbidden(); }
                if id.starts_with("builtin:") { return detail(400, "Built-in decoders cannot be deleted"); }
                let before = st.decoders.len();
                st.decoders.retain(|(d, _)| d["id"] != *id);
                if st.decoders.len() == before { return detail(404, "Decoder not found"); }
                reply(200, json!({"status": "deleted"}))
            }
            (Verb::Get, ["devices"]) => reply(200, Value::Array(st.devices.clone())),
            (Verb::Post, ["devices"]) => {
                if !can_mutate { return forbidden(); }
                let id = st.next("device");
                let dev = json!({"id": id, "devaddr": body["devaddr"], "device_name": body.get("device_name").cloned().unwrap_or(Value::Null),
                                 "nwkskey": body["nwkskey"], "appskey": body["appskey"]});
                st.devices.push(dev.clone());
                reply(200, dev)
            }
            (Verb::Delete, ["devices", id]) => {
                if !can_mutate { return forbidden(); }
                let before = st.devices.len();
                st.devices.retain(|d| d["id"] != *id);
                if st.devices.len() == before { return detail(404, "Device not found"); }
                reply(200, json!({"status": "deleted"}))
            }
            (_, ["admin", ..]) if !is_admin => forbidden(),
            (Verb::Get, ["admin", "users"]) => reply(200, Value::Array(st.users.iter().map(UserRec::admin_view).collect())),
            (Verb::Post, ["admin", "users"]) => {
                let email = body["email"].as_str().unwrap_or_default().to_string();
                if st.users.iter().any(|u| u.email == email) { return detail(409, "User already exists"); }
                let id = st.next("user");
                let rec = UserRec {
                    id, email: email.clone(), password: body["password"].as_str().unwrap_or_default().into(),
                    role: body["role"].as_str().unwrap_or("viewer").into(), active: body["is_active"].as_bool().unwrap_or(true),
                    created_at: naive_now(), updated_at: naive_now(),
                };
                let view = rec.admin_view();
                st.users.push(rec);
                st.audit(actor, "admin.user.create", json!({"email": email}));
                reply(201, view)
            }
            (Verb::Patch, ["admin", "users", id]) => {
                let Some(u) = st.users.iter_mut().find(|u| u.id == *id) else { return detail(404, "User not found"); };
                if let Some(r) = body["role"].as_str() { u.role = r.into(); }
                if let Some(a) = body["is_active"].as_bool() { u.active = a; }
                if let Some(p) = body["password"].as_str() { u.password = p.into(); }
                u.updated_at = naive_now();
                let view = u.admin_view();
                st.audit(actor, "admin.user.update", json!({"user_id": id, "password_reset": body.get("password").is_some()}));
                reply(200, view)
            }
            (Verb::Delete, ["admin", "users", id]) => {
                if *id == uid { return detail(400, "Cannot delete yourself"); }
                let before = st.users.len();
                st.users.retain(|u| u.id != *id);
                if st.users.len() == before { return detail(404, "User not found"); }
                st.audit(actor, "admin.user.delete", json!({"user_id": id}));
                ApiResponse { status: 204, ..Default::default() }
            }
            (Verb::Get, ["admin", "audit"]) => {
                let action = request.query.iter().find(|(k, _)| k == "action").map(|(_, v)| v.clone());
                let events: Vec<Value> = st.audit.iter().rev().filter(|e| action.as_deref().map_or(true, |a| e["action"] == a)).cloned().collect();
                reply(200, Value::Array(events))
            }
            _ => detail(404, "Not Found"),
        }
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> ConsoleResult<ApiResponse> {
        let key = format!("{} {}", request.verb.as_str(), request.path);
        self.calls.lock().push(key.clone());
        let gate = self.gates.lock().get(&key).cloned();
        if let Some(g) = gate {
            self.entered.notify_one();
            g.notified().await;
        }
        let resp = self.route(request, bearer);
        tprintln!("fake backend: {} -> {}", key, resp.status);
        Ok(resp)
    }
}
