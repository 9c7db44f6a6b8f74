//! Telegram command handlers and the echo/relay path.
//!
//! Every command passes the dispatch gate first; privileged commands then
//! check the admin room. Rejections are silent toward the chat: the sender
//! learns nothing, the logs tell the story.

use std::sync::Arc;

use log::{debug, error, info};
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use teloxide::utils::command::BotCommands;

use crate::logutil::escape_log;
use crate::meshtastic::nodes::format_nodes;
use crate::qr;
use crate::split::{split_message, TELEGRAM_MAX_MESSAGE};

use super::gate;
use super::render;
use super::BridgeState;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Bridge commands:")]
pub enum Command {
    #[command(description = "greeting")]
    Start,
    #[command(description = "list known mesh nodes")]
    Nodes,
    #[command(description = "reboot the radio (admin)")]
    Reboot,
    #[command(description = "bot, firmware and uptime info")]
    Uptime,
    #[command(description = "primary channel QR code")]
    Qr,
    #[command(description = "primary channel URL")]
    Ch,
    #[command(description = "map link")]
    Map,
    #[command(rename = "reset_db", description = "reset the radio node DB (admin)")]
    ResetDb,
    #[command(description = "traceroute to a node (admin)")]
    Traceroute { dest: String },
    #[command(description = "traceroute every node with a position (admin)")]
    Routes,
}

fn require_admin(state: &BridgeState, msg: &Message, what: &str) -> bool {
    if gate::is_admin_room(&state.config.telegram, msg.chat.id.0) {
        true
    } else {
        info!("{what} requested by non-admin: {}", msg.chat.id);
        false
    }
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BridgeState>,
) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| u.id.0);
    if !gate::command_allowed(&state.config.telegram, &state.filter, msg.chat.id.0, user_id) {
        return Ok(());
    }

    match cmd {
        Command::Start => {
            info!("Got /start from {}", msg.chat.id);
            bot.send_message(msg.chat.id, render::GREETING).await?;
        }
        Command::Reboot => {
            if !require_admin(&state, &msg, "Reboot") {
                return Ok(());
            }
            bot.send_message(msg.chat.id, "Requesting reboot...").await?;
            if let Err(e) = state.device.reboot().await {
                error!("Reboot failed: {e}");
                bot.send_message(msg.chat.id, format!("Reboot failed: {e}"))
                    .await?;
            }
        }
        Command::ResetDb => {
            if !require_admin(&state, &msg, "Node DB reset") {
                return Ok(());
            }
            bot.send_message(msg.chat.id, "Requesting node DB reset...")
                .await?;
            if let Err(e) = state.device.reset_node_db().await {
                error!("Node DB reset failed: {e}");
                bot.send_message(msg.chat.id, format!("Node DB reset failed: {e}"))
                    .await?;
            }
        }
        Command::Traceroute { dest } => {
            if !require_admin(&state, &msg, "Traceroute") {
                return Ok(());
            }
            bot.send_message(msg.chat.id, "Sending traceroute... See bot logs")
                .await?;
            state.routes.submit(dest.trim());
        }
        Command::Routes => {
            if !require_admin(&state, &msg, "Routes") {
                return Ok(());
            }
            for node in state.device.nodes().await {
                if node.position.is_none() {
                    continue;
                }
                if let Some(user) = node.user.as_ref() {
                    state.routes.submit(&user.id);
                }
            }
        }
        Command::Qr => match state.device.channel_url().await {
            Some(url) => {
                debug!("Primary channel URL {url}");
                // The temp file guard drops at the end of this arm, removing
                // the PNG whether or not the upload succeeded.
                match qr::write_qr_png(&url) {
                    Ok(file) => {
                        bot.send_photo(msg.chat.id, InputFile::file(file.path().to_path_buf()))
                            .await?;
                    }
                    Err(e) => {
                        error!("QR render failed: {e}");
                        bot.send_message(msg.chat.id, "Could not render the QR code")
                            .await?;
                    }
                }
            }
            None => {
                bot.send_message(msg.chat.id, "Channel URL not available yet")
                    .await?;
            }
        },
        Command::Ch => {
            let reply = state
                .device
                .channel_url()
                .await
                .unwrap_or_else(|| "Channel URL not available yet".to_string());
            bot.send_message(msg.chat.id, reply).await?;
        }
        Command::Uptime => {
            let status = state.device.status().await;
            bot.send_message(
                msg.chat.id,
                render::render_uptime(&status, state.started_at.elapsed()),
            )
            .await?;
        }
        Command::Map => {
            let telegram = &state.config.telegram;
            let reply = if telegram.map_link_enabled {
                telegram.map_link.clone()
            } else {
                "Map link not enabled".to_string()
            };
            bot.send_message(msg.chat.id, reply).await?;
        }
        Command::Nodes => {
            let status = state.device.status().await;
            let nodes = state.device.nodes().await;
            let formatted = format_nodes(
                &nodes,
                state.config.telegram.node_include_self,
                status.our_node_id,
            );
            for chunk in split_message(&formatted, TELEGRAM_MAX_MESSAGE) {
                bot.send_message(msg.chat.id, chunk)
                    .parse_mode(ParseMode::MarkdownV2)
                    .await?;
            }
        }
    }
    Ok(())
}

/// Relay path for any non-command message in the relay room. Never replies;
/// rejections are only visible in the logs.
pub async fn handle_echo(msg: Message, state: Arc<BridgeState>) -> ResponseResult<()> {
    if msg.chat.id.0 != state.config.telegram.relay_room {
        debug!(
            "Ignoring message in {} (relay room is {})",
            msg.chat.id, state.config.telegram.relay_room
        );
        return Ok(());
    }
    let Some(user) = msg.from() else {
        return Ok(());
    };
    if state.filter.banned(&user.id.0.to_string()) {
        debug!("User {} is in the blacklist", user.id);
        return Ok(());
    }
    // Unparsed slash commands land here; they are not relay material.
    if msg.text().is_some_and(|t| t.starts_with('/')) {
        return Ok(());
    }

    let name = render::display_name(&user.first_name, user.last_name.as_deref());
    let sticker = msg
        .sticker()
        .and_then(|s| Some((s.set_name.as_deref()?, s.emoji.as_deref()?)));
    let Some(forward) = render::render_forward(&name, msg.text(), sticker) else {
        return Ok(());
    };
    debug!("{} {}", msg.chat.id, escape_log(&forward));
    state.device.send_text(forward);
    Ok(())
}
