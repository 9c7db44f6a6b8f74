//! # Meshgram - Telegram bridge for Meshtastic networks
//!
//! Meshgram forwards text messages between a Telegram room and a Meshtastic
//! LoRa mesh, in both directions, and exposes a small set of administrative
//! commands over Telegram (reboot, node listing, traceroute, channel QR code,
//! uptime).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshgram::bridge::Bridge;
//! use meshgram::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load("config.toml").await?;
//!
//!     // Create and run the bridge (blocks until shutdown)
//!     let bridge = Bridge::new(config).await?;
//!     bridge.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bridge`] - Telegram dispatcher, command handlers, and the mesh event pump
//! - [`meshtastic`] - Mesh device actor: connection, node table, device commands
//! - [`config`] - Configuration management
//! - [`filter`] - Blacklist membership checks
//! - [`split`] - Chunking long messages for the Telegram length limit
//! - [`qr`] - Channel URL QR rendering
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐      ┌─────────────────┐      ┌─────────────────┐
//! │  Telegram room  │ ←──→ │     Bridge      │ ←──→ │  Device actor   │
//! │  (teloxide)     │      │   (dispatch)    │      │  (meshtastic)   │
//! └─────────────────┘      └─────────────────┘      └─────────────────┘
//! ```
//!
//! The device connection is owned by exactly one task; every other component
//! talks to it through a cloneable [`meshtastic::DeviceHandle`]. Background
//! traceroutes go through a bounded worker queue instead of ad-hoc task
//! spawning.

pub mod bridge;
pub mod config;
pub mod filter;
pub mod logutil;
pub mod meshtastic;
pub mod qr;
pub mod split;
