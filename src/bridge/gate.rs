//! Dispatch gating for Telegram commands.
//!
//! Plain guard functions invoked at the top of command handling, applied
//! uniformly before any command body runs. Rejections are silent toward the
//! chat and visible only at debug level.

use log::debug;

use crate::config::TelegramConfig;
use crate::filter::AccessFilter;

/// Gate applied to every command: reject when the message arrived in one of
/// the two control rooms while the bot is configured to stay out of them, or
/// when the sender is blacklisted.
pub fn command_allowed(
    config: &TelegramConfig,
    filter: &AccessFilter,
    chat_id: i64,
    user_id: Option<u64>,
) -> bool {
    let control_rooms = [config.relay_room, config.notifications_room];
    if control_rooms.contains(&chat_id) && !config.bot_in_rooms {
        debug!("Ignoring command in control room {chat_id}");
        return false;
    }
    if let Some(user_id) = user_id {
        if filter.banned(&user_id.to_string()) {
            debug!("User {user_id} is in the blacklist");
            return false;
        }
    }
    true
}

/// Privileged commands additionally require the configured admin room.
pub fn is_admin_room(config: &TelegramConfig, chat_id: i64) -> bool {
    chat_id == config.admin_room
}
