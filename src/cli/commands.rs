use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::console::Console;
use crate::identity::{Identity, Role, SessionStatus};
use crate::pipeline::{
    parse_device_filter, DecodeRequest, DecodeResultSet, ExportFormat, GenerateRequest, GeneratorPreset, LogFile,
    ReplayJob, ReplayRequest, ScanToken,
};
use crate::registry::{AuditQuery, NewDevice, NewUser, PasswordChange, UserEdit};
use crate::views::ViewSlot;

use super::{json_output, print_table, CliArgs};

pub fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} <command> [args] [--flags]\n\nSession:\n  health                                  backend liveness (no login needed)\n  login <email> [--password <p>]          password also read from UPLINK_PASSWORD or stdin\n  logout\n  whoami\n\nFiles:\n  files\n  upload <path>\n  generate [--preset heartbeat|gps|sensor|empty] [--gateway <eui>] [--devaddr <hex>] [--frames <n>]\n           [--interval <s>] [--frequency <mhz>] [--datarate <dr>] [--coding-rate <cr>] [--payload <hex>] [--name <file>]\n  download <file-id> [--out <path>]\n  preview <file-id>\n  delete-file <file-id>\n  scan <file-id>\n\nDecode & replay:\n  decode <scan-token> [--decoder <id>] [--devaddrs a,b] [--export csv|json --out <path>]\n  replay <scan-token> [--host <h>] [--port <p>]\n\nRegistry:\n  decoders | decoder-source <id> | upload-decoder <path.js> | delete-decoder <id>\n  devices | add-device <devaddr> <nwkskey> <appskey> [--name <n>] | delete-device <id>\n  users | add-user <email> <password> [--role r] [--inactive] | delete-user <id>\n  edit-user <id> [--role r] [--active true|false] [--password <p>]\n  audit [--action <name>] [--limit <n>]\n\nOutput:\n  --json                                  print JSON instead of tables (same as UPLINK_OUTPUT=json)\n\nEnvironment:\n  UPLINK_API_BASE, UPLINK_API_PREFIX, UPLINK_CREDENTIAL_FILE, UPLINK_HTTP_TIMEOUT_SECS, UPLINK_OUTPUT=json, RUST_LOG"
    )
}

fn emit<T: Serialize>(value: &T) -> Result<bool> {
    if json_output() {
        println!("{}", serde_json::to_string_pretty(value)?);
        return Ok(true);
    }
    Ok(false)
}

fn print_identity(id: &Identity) {
    println!("{} ({}){}", id.email, id.role, if id.active { "" } else { " [inactive]" });
}

fn print_files(files: &[LogFile]) -> Result<()> {
    if emit(&files)? { return Ok(()); }
    let rows: Vec<Vec<String>> = files
        .iter()
        .map(|f| {
            vec![
                f.id.clone(),
                f.filename.clone(),
                f.size_bytes.to_string(),
                format!("{:?}", f.source_type).to_lowercase(),
                f.uploaded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    print_table(&["id", "filename", "size_bytes", "source", "uploaded_at"], &rows);
    Ok(())
}

fn print_scan(token: &ScanToken) -> Result<()> {
    if emit(token)? { return Ok(()); }
    println!("scan token: {}", token.token);
    println!("expires at: {}", token.expires_at.to_rfc3339());
    println!("records:    {}", token.summary.record_count);
    println!("gateways:   {}", token.summary.gateway_ids.join(", "));
    println!("devices:    {}", token.summary.device_addrs.join(", "));
    Ok(())
}

fn print_decode(set: &DecodeResultSet) -> Result<()> {
    if emit(set)? { return Ok(()); }
    let opt = |v: Option<String>| v.unwrap_or_default();
    let rows: Vec<Vec<String>> = set
        .rows
        .iter()
        .map(|r| {
            vec![
                format!("{:?}", r.status).to_lowercase(),
                opt(r.device_addr.clone()),
                opt(r.frame_counter.map(|n| n.to_string())),
                opt(r.port.map(|n| n.to_string())),
                opt(r.time.clone()),
                opt(r.payload_hex.clone()),
                opt(r.decoded_payload.as_ref().map(|v| v.to_string())),
                opt(r.error.clone()),
            ]
        })
        .collect();
    print_table(&["status", "devaddr", "fcnt", "fport", "time", "payload_hex", "decoded", "error"], &rows);
    println!("decode token: {} ({} ok of {})", set.token, set.ok_count(), set.rows.len());
    Ok(())
}

fn print_replay(job: &ReplayJob) -> Result<()> {
    if emit(job)? { return Ok(()); }
    let rows: Vec<Vec<String>> = job
        .rows
        .iter()
        .map(|r| {
            vec![
                format!("{:?}", r.status).to_lowercase(),
                r.gateway_id.clone().unwrap_or_default(),
                r.frequency.map(|f| f.to_string()).unwrap_or_default(),
                r.size.map(|s| s.to_string()).unwrap_or_default(),
                r.message.clone(),
            ]
        })
        .collect();
    print_table(&["status", "gateway_eui", "frequency", "size", "message"], &rows);
    println!("replay job: {} ({} sent of {})", job.id, job.sent_count(), job.rows.len());
    Ok(())
}

fn read_password(args: &CliArgs) -> Result<String> {
    if let Some(p) = args.flag("password") { return Ok(p.to_string()); }
    if let Ok(p) = std::env::var("UPLINK_PASSWORD") { return Ok(p); }
    print!("password: ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn write_out(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

fn read_in(path: &str) -> Result<(String, Vec<u8>)> {
    let p = Path::new(path);
    let bytes = fs::read(p).with_context(|| format!("reading {}", p.display()))?;
    let name = p.file_name().and_then(|n| n.to_str()).ok_or_else(|| anyhow!("'{}' has no file name", path))?;
    Ok((name.to_string(), bytes))
}

fn generate_request(args: &CliArgs) -> Result<GenerateRequest> {
    let mut req = match args.flag("preset") {
        Some(p) => GenerateRequest::from_preset(GeneratorPreset::parse(p).ok_or_else(|| anyhow!("unknown preset '{}'", p))?),
        None => GenerateRequest::default(),
    };
    if let Some(v) = args.flag("gateway") { req.gateway_id = v.to_string(); }
    if let Some(v) = args.flag("devaddr") { req.device_addr = v.to_string(); }
    if let Some(v) = args.parsed_flag::<u32>("frames")? { req.frames = v; }
    if let Some(v) = args.parsed_flag::<u32>("interval")? { req.interval_seconds = v; }
    if let Some(v) = args.parsed_flag::<f64>("frequency")? { req.frequency_mhz = v; }
    if let Some(v) = args.flag("datarate") { req.datarate = v.to_string(); }
    if let Some(v) = args.flag("coding-rate") { req.coding_rate = v.to_string(); }
    if let Some(v) = args.flag("payload") { req.payload_hex = Some(v.to_string()); }
    if let Some(v) = args.flag("name") { req.filename = Some(v.to_string()); }
    Ok(req)
}

/// Value of a view after a refresh, or why there is none.
fn loaded<T: Clone>(console: &Console, slot: &ViewSlot<T>, applied: bool) -> Result<T> {
    if let Some(e) = slot.error() { return Err(e.into()); }
    match slot.value() {
        Some(v) if applied => Ok(v),
        _ => match console.session().snapshot().status {
            SessionStatus::Failed(reason) => bail!("session ended: {}", reason),
            _ => bail!("{} not loaded: not logged in", slot.name()),
        },
    }
}

fn parse_role(s: &str) -> Result<Role> { s.parse::<Role>().map_err(|e| anyhow!("{}", e)) }

/// Run one command against an already started console.
pub async fn run(console: &Console, args: &CliArgs) -> Result<()> {
    super::force_json_output(args.switch("--json"));
    let cancel = CancellationToken::new();
    let pipeline = console.pipeline();
    let registry = console.registry();
    match args.command.as_str() {
        "health" => {
            console.check_health(&cancel).await;
            let state = console.health.snapshot();
            match (state.value, state.error) {
                (Some(h), _) if h.is_ok() => println!("backend: ok"),
                (Some(h), _) => bail!("backend reports status '{}'", h.status),
                (None, Some(e)) => bail!("backend unreachable: {}", e.message()),
                (None, None) => bail!("health check cancelled"),
            }
        }
        "login" => {
            let email = args.arg(0, "email")?;
            let password = read_password(args)?;
            let id = console.login(email, &password).await?;
            print_identity(&id);
        }
        "logout" => {
            console.logout();
            println!("logged out");
        }
        "whoami" => match console.session().identity() {
            Some(id) => {
                if !emit(&id)? { print_identity(&id); }
            }
            None => bail!("not logged in"),
        },
        "files" => {
            let applied = console.refresh_files().await;
            let list = loaded(console, &console.files, applied)?;
            print_files(&list)?;
        }
        "upload" => {
            let (name, bytes) = read_in(args.arg(0, "path")?)?;
            let f = pipeline.upload_file(&name, bytes, &cancel).await?;
            print_files(std::slice::from_ref(&f))?;
        }
        "generate" => {
            let f = pipeline.generate_file(generate_request(args)?, &cancel).await?;
            print_files(std::slice::from_ref(&f))?;
        }
        "download" => {
            let id = args.arg(0, "file-id")?;
            let payload = pipeline.download_file(id, &cancel).await?;
            let out = args.flag("out").unwrap_or(payload.filename.as_str());
            write_out(Path::new(out), &payload.bytes)?;
        }
        "preview" => {
            let p = pipeline.preview_file(args.arg(0, "file-id")?, &cancel).await?;
            if !emit(&p)? {
                print!("{}", p.content);
                if p.truncated { println!("... (truncated)"); }
            }
        }
        "delete-file" => {
            let id = args.arg(0, "file-id")?;
            pipeline.delete_file(id, &cancel).await?;
            println!("deleted file {}", id);
        }
        "scan" => {
            let token = pipeline.scan(args.arg(0, "file-id")?, &cancel).await?;
            print_scan(&token)?;
        }
        "decode" => {
            let req = DecodeRequest {
                scan_token: args.arg(0, "scan-token")?.to_string(),
                decoder_id: args.flag("decoder").unwrap_or_default().to_string(),
                device_addrs: parse_device_filter(args.flag("devaddrs").unwrap_or_default()),
            };
            let set = pipeline.decode(&req, &cancel).await?;
            print_decode(&set)?;
            if let Some(fmt) = args.flag("export") {
                let format = ExportFormat::parse(fmt).ok_or_else(|| anyhow!("export format must be csv or json"))?;
                let payload = pipeline.export(&set.token, format, &cancel).await?;
                let out = args.flag("out").unwrap_or(payload.filename.as_str());
                write_out(Path::new(out), &payload.bytes)?;
            }
        }
        "replay" => {
            let mut req = ReplayRequest::new(args.arg(0, "scan-token")?);
            if let Some(h) = args.flag("host") { req.udp_host = h.to_string(); }
            if let Some(p) = args.parsed_flag::<u32>("port")? { req.udp_port = p; }
            let job = pipeline.replay(&req, &cancel).await?;
            print_replay(&job)?;
        }
        "decoders" => {
            let applied = console.refresh_decoders().await;
            let list = loaded(console, &console.decoders, applied)?;
            if !emit(&list)? {
                let rows: Vec<Vec<String>> = list
                    .iter()
                    .map(|d| vec![d.id.clone(), d.name.clone(), format!("{:?}", d.kind).to_lowercase(), d.size_bytes.to_string()])
                    .collect();
                print_table(&["id", "name", "kind", "size_bytes"], &rows);
            }
        }
        "decoder-source" => {
            print!("{}", registry.decoder_source(args.arg(0, "decoder-id")?, &cancel).await?);
        }
        "upload-decoder" => {
            let (name, bytes) = read_in(args.arg(0, "path")?)?;
            let d = registry.upload_decoder(&name, bytes, &cancel).await?;
            println!("uploaded decoder {} ({}, {} bytes)", d.id, d.name, d.size_bytes);
        }
        "delete-decoder" => {
            let id = args.arg(0, "decoder-id")?;
            registry.delete_decoder(id, &cancel).await?;
            println!("deleted decoder {}", id);
        }
        "devices" => {
            let applied = console.refresh_devices().await;
            let list = loaded(console, &console.devices, applied)?;
            if !emit(&list)? {
                let rows: Vec<Vec<String>> = list
                    .iter()
                    .map(|d| vec![d.id.clone(), d.device_addr.clone(), d.device_name.clone().unwrap_or_default(), d.network_session_key.clone(), d.app_session_key.clone()])
                    .collect();
                print_table(&["id", "devaddr", "name", "nwkskey", "appskey"], &rows);
            }
        }
        "add-device" => {
            let device = NewDevice {
                device_addr: args.arg(0, "devaddr")?.to_string(),
                network_session_key: args.arg(1, "nwkskey")?.to_string(),
                app_session_key: args.arg(2, "appskey")?.to_string(),
                device_name: args.flag("name").map(str::to_string),
            };
            let d = registry.create_device(device, &cancel).await?;
            println!("created device {} ({})", d.id, d.device_addr);
        }
        "delete-device" => {
            let id = args.arg(0, "device-id")?;
            registry.delete_device(id, &cancel).await?;
            println!("deleted device {}", id);
        }
        "users" => {
            let applied = console.refresh_users().await;
            let list = loaded(console, &console.users, applied)?;
            if !emit(&list)? {
                let rows: Vec<Vec<String>> = list
                    .iter()
                    .map(|u| vec![u.id.clone(), u.email.clone(), u.role.to_string(), u.active.to_string(), u.created_at.format("%Y-%m-%d").to_string()])
                    .collect();
                print_table(&["id", "email", "role", "active", "created"], &rows);
            }
        }
        "add-user" => {
            let mut user = NewUser::new(args.arg(0, "email")?, args.arg(1, "password")?, Role::Viewer);
            if let Some(r) = args.flag("role") { user.role = parse_role(r)?; }
            user.active = !args.switch("--inactive");
            let u = registry.create_user(user, &cancel).await?;
            println!("created user {} ({})", u.email, u.role);
        }
        "edit-user" => {
            let id = args.arg(0, "user-id")?;
            let users = registry.list_users(&cancel).await?;
            let current = users.iter().find(|u| u.id == id).ok_or_else(|| anyhow!("no user with id {}", id))?;
            let mut edit = UserEdit::from_user(current);
            if let Some(r) = args.flag("role") { edit.role = parse_role(r)?; }
            if let Some(a) = args.parsed_flag::<bool>("active")? { edit.active = a; }
            edit.password = PasswordChange::from_input(args.flag("password").unwrap_or_default());
            let u = registry.update_user(id, &edit, &cancel).await?;
            println!("updated user {} ({}, active={})", u.email, u.role, u.active);
        }
        "delete-user" => {
            let id = args.arg(0, "user-id")?;
            registry.delete_user(id, &cancel).await?;
            println!("deleted user {}", id);
        }
        "audit" => {
            let query = AuditQuery { action: args.flag("action").map(str::to_string), limit: args.parsed_flag::<u32>("limit")? };
            let applied = console.refresh_audit(&query).await;
            let list = loaded(console, &console.audit, applied)?;
            if !emit(&list)? {
                let rows: Vec<Vec<String>> = list
                    .iter()
                    .map(|e| {
                        vec![
                            e.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                            e.actor_email.clone().unwrap_or_default(),
                            e.action.clone(),
                            e.detail.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                print_table(&["at", "actor", "action", "detail"], &rows);
            }
        }
        "" => bail!("no command given"),
        other => bail!("unknown command '{}'", other),
    }
    Ok(())
}
