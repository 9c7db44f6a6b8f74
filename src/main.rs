//! Binary entrypoint for the Meshgram CLI.
//!
//! Commands:
//! - `start [--device <addr>]` - run the bridge
//! - `init` - create a starter `config.toml`
//! - `check-device --device <addr> [--timeout <s>]` - probe the radio link
//!   and print a JSON summary
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use meshgram::bridge::Bridge;
use meshgram::config::Config;
use meshgram::meshtastic::MeshDevice;

#[derive(Parser)]
#[command(name = "meshgram")]
#[command(about = "A Telegram to Meshtastic bridge for LoRa mesh networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge
    Start {
        /// Device address override (e.g. /dev/ttyACM0 or tcp:host:4403)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Initialize a new bridge configuration
    Init,
    /// Probe the device link: connect, wait for config sync, print a summary
    CheckDevice {
        /// Device address (e.g. /dev/ttyACM0 or tcp:host:4403)
        #[arg(short, long)]
        device: String,
        /// Seconds to wait before giving up
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { device } => {
            info!("Starting Meshgram v{}", env!("CARGO_PKG_VERSION"));
            let mut config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            if let Some(device) = device {
                config.meshtastic.device = device;
            }
            let bridge = Bridge::new(config).await?;
            bridge.run().await?;
        }
        Commands::Init => {
            info!("Initializing new bridge configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::CheckDevice { device, timeout } => {
            use tokio::time::{timeout as with_timeout, Duration, Instant};

            let config = meshgram::config::MeshtasticConfig {
                device,
                ..Config::default().meshtastic
            };
            let mut probe = MeshDevice::new(&config);
            probe.connect().await?;
            info!("Probing device on {}", config.device);

            let deadline = Instant::now() + Duration::from_secs(timeout);
            while Instant::now() < deadline && !probe.config_complete() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let polled = with_timeout(remaining, probe.next_packet()).await;
                match polled {
                    Ok(Some(packet)) => {
                        let _ = probe.handle_from_radio(packet);
                    }
                    Ok(None) | Err(_) => break,
                }
            }

            let status = probe.status();
            let payload = serde_json::json!({
                "status": if status.config_complete { "ok" } else { "incomplete" },
                "config_complete": status.config_complete,
                "firmware_version": status.firmware_version,
                "reboot_count": status.reboot_count,
                "hop_limit": status.hop_limit,
                "node_count": status.node_count,
                "our_node_id": status.our_node_id,
                "timeout_seconds": timeout,
            });
            println!("{payload}");
            probe.disconnect().await;
            std::process::exit(if status.config_complete { 0 } else { 1 });
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity, falling back to the configured level.
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // teloxide's own polling internals are noisy below info.
    builder.filter_module("teloxide", log::LevelFilter::Info);

    let file = config.as_ref().and_then(|c| c.logging.file.clone());
    if let Some(file) = file {
        if let Ok(f) = std::fs::OpenOptions::new().create(true).append(true).open(&file) {
            let sink = std::sync::Arc::new(std::sync::Mutex::new(f));
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = sink.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
