use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use uplink_console::cli::{self, CliArgs};
use uplink_console::{Console, ConsoleConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut argv: Vec<String> = std::env::args().collect();
    let program = if argv.is_empty() { "uplink-console".to_string() } else { argv.remove(0) };
    let args = CliArgs::parse(&argv)?;
    if args.wants_help() || args.command.is_empty() {
        eprintln!("{}", cli::commands::usage(&program));
        return Ok(());
    }

    let cfg = ConsoleConfig::from_env();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "uplink_console",
        "uplink-console starting: RUST_LOG='{}', api='{}{}', credentials='{}', timeout={}s",
        rust_log, cfg.api_base, cfg.api_prefix, cfg.credential_file.display(), cfg.http_timeout_secs
    );

    let console = Console::from_config(&cfg)?;
    // health and login do not need the persisted session
    if !matches!(args.command.as_str(), "health" | "login") {
        if let Err(e) = console.start().await {
            warn!("stored session is not usable: {}", e.message());
        }
    }
    let result = cli::run(&console, &args).await;
    console.teardown();
    result
}
