//! Hermes CLI - Entry point
//!
//! Interactive WebSocket client: stdin lines go out as text messages,
//! inbound messages are printed to stdout, logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use hermes_cli::{CliConfig, MessagePrinter};
use hermes_client::WsClient;
use hermes_telemetry::init_logging;

/// How long to wait for the server to answer our Close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
    /// Target URL, overriding the configuration.
    url: Option<String>,
    /// Ping interval in seconds, overriding the configuration.
    ping: Option<u64>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self {
            config: None,
            url: None,
            ping: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    parsed.config = args.next().map(PathBuf::from);
                }
                "--url" | "-u" => {
                    parsed.url = args.next();
                }
                "--ping" => match args.next().and_then(|v| v.parse().ok()) {
                    Some(secs) => parsed.ping = Some(secs),
                    None => {
                        eprintln!("--ping expects a number of seconds");
                        std::process::exit(1);
                    }
                },
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("hermes {}", hermes_cli::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        parsed
    }
}

fn print_help() {
    println!(
        r#"Hermes - WebSocket client

USAGE:
    hermes [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -u, --url <URL>        Target URL (ws:// or wss://)
        --ping <SECS>      Keep-alive ping interval, 0 disables
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    HERMES_URL                   Target URL
    HERMES_MAX_FRAME_SIZE        Maximum frame size in bytes (default: 1048576)
    HERMES_HTTP_VERSION          Upgrade request HTTP version (default: HTTP/1.1)
    HERMES_AUTO_RESPOND_TO_PING  Answer pings automatically (default: true)
    HERMES_PING_INTERVAL_SECS    Keep-alive ping interval, 0 disables
    HERMES_LOG_LEVEL             Log filter (default: info)
    HERMES_LOG_JSON              JSON log output (default: true)

EXAMPLES:
    # Connect and type messages
    hermes --url wss://echo.example.com/

    # Run with configuration file
    hermes --config hermes.toml
"#
    );
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!(error = %e, "Hermes exited with an error");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => CliConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CliConfig::default(),
    };
    let mut config = config.with_env_overrides();

    if let Some(url) = args.url {
        config.client.url = url;
    }
    if let Some(secs) = args.ping {
        config.client.ping_interval = (secs > 0).then(|| Duration::from_secs(secs));
    }

    config.validate().context("invalid configuration")?;
    init_logging(&config.logging).context("failed to initialize logging")?;

    info!(
        version = hermes_cli::VERSION,
        url = %config.client.url,
        "Starting hermes"
    );

    let client = WsClient::connect(config.client, MessagePrinter::stdout())
        .await
        .context("failed to connect")?;
    let mut receiver = client.run_async();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("failed to read stdin")? {
                Some(line) => {
                    if let Err(e) = client.send_text(&line).await {
                        if e.is_fatal() {
                            client.close().await;
                            return Err(e).context("failed to send message");
                        }
                        warn!(error = %e, "Message not sent");
                    }
                }
                None => {
                    info!("End of input, disconnecting");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, disconnecting");
                break;
            }
            result = &mut receiver => {
                client.close().await;
                result.context("receive loop panicked")??;
                return Ok(());
            }
        }
    }

    client.disconnect().await.context("failed to send close frame")?;
    match tokio::time::timeout(CLOSE_TIMEOUT, &mut receiver).await {
        Ok(result) => result.context("receive loop panicked")??,
        Err(_) => {
            warn!("Server did not complete the close handshake");
            client.close().await;
        }
    }

    Ok(())
}
