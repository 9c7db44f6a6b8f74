//! # Configuration Management Module
//!
//! Meshgram reads a single TOML file with four sections:
//!
//! - [`TelegramConfig`] - bot token and the room topology (relay room,
//!   notifications room, admin room) plus presentation toggles
//! - [`MeshtasticConfig`] - device address and radio-side settings
//! - [`BlacklistConfig`] - static ban lists for both transports
//! - [`LoggingConfig`] - log level and optional file sink
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshgram::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Relay room: {}", config.telegram.relay_room);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [telegram]
//! token = ""                      # falls back to TELOXIDE_TOKEN when empty
//! relay_room = -1001234567890
//! notifications_room = -1001234567891
//! admin_room = 123456789
//! bot_in_rooms = false
//!
//! [meshtastic]
//! device = "/dev/ttyACM0"         # or "tcp:host:4403"
//! baud_rate = 115200
//!
//! [blacklist]
//! telegram_users = [111111111]
//! mesh_nodes = ["!deadbeef"]
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub meshtastic: MeshtasticConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    pub logging: LoggingConfig,
}

/// Telegram-side settings: the bot token and the room topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. When empty, the conventional `TELOXIDE_TOKEN`
    /// environment variable is used instead.
    #[serde(default)]
    pub token: String,
    /// The single room whose messages are forwarded to the mesh.
    pub relay_room: i64,
    /// Room receiving new-node notifications.
    pub notifications_room: i64,
    /// Room/user allowed to run privileged device commands.
    pub admin_room: i64,
    /// When false, commands arriving in the relay or notifications room are
    /// ignored entirely (the bot only relays there).
    #[serde(default)]
    pub bot_in_rooms: bool,
    /// Send new-node notifications to the notifications room.
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    /// Include the bridge's own node in the /nodes listing.
    #[serde(default = "default_true")]
    pub node_include_self: bool,
    #[serde(default)]
    pub map_link_enabled: bool,
    #[serde(default)]
    pub map_link: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshtasticConfig {
    /// Device address: a serial path (`/dev/ttyACM0`) or `tcp:<host>:<port>`.
    pub device: String,
    pub baud_rate: u32,
    /// Seconds to wait after a reboot request before reconnecting.
    #[serde(default = "default_reboot_settle")]
    pub reboot_settle_secs: u64,
    /// Text sent to a newly discovered node.
    #[serde(default)]
    pub welcome_message: String,
    /// Capacity of the background traceroute queue.
    #[serde(default = "default_traceroute_queue")]
    pub traceroute_queue: usize,
}

fn default_reboot_settle() -> u64 {
    20
}

fn default_traceroute_queue() -> usize {
    32
}

/// Static ban lists, consulted read-only for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlacklistConfig {
    /// Telegram user IDs.
    #[serde(default)]
    pub telegram_users: Vec<u64>,
    /// Mesh node IDs in `!hex` form.
    #[serde(default)]
    pub mesh_nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            telegram: TelegramConfig {
                token: String::new(),
                relay_room: 0,
                notifications_room: 0,
                admin_room: 0,
                bot_in_rooms: false,
                notifications_enabled: true,
                node_include_self: true,
                map_link_enabled: false,
                map_link: String::new(),
            },
            meshtastic: MeshtasticConfig {
                device: "/dev/ttyACM0".to_string(),
                baud_rate: 115200,
                reboot_settle_secs: 20,
                welcome_message: "Hello from the mesh bridge!".to_string(),
                traceroute_queue: 32,
            },
            blacklist: BlacklistConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("meshgram.log".to_string()),
            },
        }
    }
}
