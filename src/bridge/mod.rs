//! # Chat Bridge Module
//!
//! Wires the Telegram dispatcher to the mesh device actor:
//!
//! - [`commands`] - command handlers plus the echo/relay path
//! - [`gate`] - dispatch gating (control rooms, blacklist, admin room)
//! - [`render`] - text assembly for relayed messages and replies
//! - [`worker`] - bounded background traceroute queue
//!
//! ```text
//! Telegram update ──→ gate ──→ handler ──→ DeviceHandle ──→ radio
//! radio packet ──→ device actor ──→ MeshEvent pump ──→ Telegram room
//! ```

pub mod commands;
pub mod gate;
pub mod render;
pub mod worker;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use log::{debug, error, info};
use teloxide::prelude::*;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::filter::AccessFilter;
use crate::logutil::escape_log;
use crate::meshtastic::{self, DeviceHandle, MeshDevice, MeshEvent};

use commands::Command;
use worker::RouteWorkerHandle;

/// Shared, read-only state handed to every handler.
pub struct BridgeState {
    pub config: Config,
    pub filter: AccessFilter,
    pub device: DeviceHandle,
    pub routes: RouteWorkerHandle,
    pub started_at: Instant,
}

/// The assembled bridge: device actor running, bot ready to poll.
pub struct Bridge {
    state: Arc<BridgeState>,
    bot: Bot,
    events: mpsc::UnboundedReceiver<MeshEvent>,
}

impl Bridge {
    /// Connect to the radio and set up the Telegram side. Fails when the
    /// device is unreachable or no bot token is configured.
    pub async fn new(config: Config) -> Result<Self> {
        let mut device = MeshDevice::new(&config.meshtastic);
        device.connect().await?;
        let (handle, events) = meshtastic::spawn(device);
        let routes = worker::spawn(handle.clone(), config.meshtastic.traceroute_queue);

        let token = if config.telegram.token.is_empty() {
            std::env::var("TELOXIDE_TOKEN").unwrap_or_default()
        } else {
            config.telegram.token.clone()
        };
        if token.is_empty() {
            bail!("no Telegram bot token: set [telegram].token or TELOXIDE_TOKEN");
        }
        let bot = Bot::new(token);
        let filter = AccessFilter::from_config(&config.blacklist);

        Ok(Self {
            state: Arc::new(BridgeState {
                config,
                filter,
                device: handle,
                routes,
                started_at: Instant::now(),
            }),
            bot,
            events,
        })
    }

    /// Run until shutdown: spawns the mesh event pump and blocks on the
    /// Telegram long-poll dispatcher.
    pub async fn run(self) -> Result<()> {
        let Bridge { state, bot, events } = self;

        tokio::spawn(pump_mesh_events(bot.clone(), state.clone(), events));

        let handler = Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(commands::handle_command),
            )
            .branch(dptree::endpoint(commands::handle_echo));

        info!(
            "Bridge started; relaying room {} to the mesh",
            state.config.telegram.relay_room
        );
        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![state])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
        Ok(())
    }
}

/// Forward device events to Telegram: relayable mesh text to the relay room,
/// new-node notices to the notifications room.
async fn pump_mesh_events(
    bot: Bot,
    state: Arc<BridgeState>,
    mut events: mpsc::UnboundedReceiver<MeshEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            MeshEvent::Text {
                from,
                long_name,
                text,
            } => {
                if state.filter.banned(&from) {
                    debug!("Node {from} is in the blacklist");
                    continue;
                }
                if render::is_range_test(&text) {
                    debug!("Range test from {long_name}: {}", escape_log(&text));
                    continue;
                }
                let relay = ChatId(state.config.telegram.relay_room);
                if let Err(e) = bot.send_message(relay, format!("{long_name}: {text}")).await {
                    error!("Failed to relay mesh text to Telegram: {e}");
                }
            }
            MeshEvent::NewNode { id, long_name } => {
                if !state.config.telegram.notifications_enabled {
                    continue;
                }
                let welcome = &state.config.meshtastic.welcome_message;
                if !welcome.is_empty() {
                    state.device.send_direct(&id, welcome);
                }
                let label = node_label(&state.config.telegram, &long_name);
                let room = ChatId(state.config.telegram.notifications_room);
                if let Err(e) = bot
                    .send_message(room, format!("New node: {id} -> {label}"))
                    .await
                {
                    error!("Failed to send new-node notification: {e}");
                }
            }
        }
    }
    debug!("mesh event pump terminated");
}

/// Label for a new-node notification: the bare name, or a map link carrying
/// it when the map is configured.
fn node_label(config: &crate::config::TelegramConfig, long_name: &str) -> String {
    if !config.map_link_enabled || config.map_link.is_empty() {
        return long_name.to_string();
    }
    let name = long_name.replace(' ', "%20");
    if config.map_link.contains('?') {
        format!("{}&name={name}", config.map_link)
    } else {
        format!("{}?name={name}", config.map_link)
    }
}
