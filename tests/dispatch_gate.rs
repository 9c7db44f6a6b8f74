//! Dispatch-gate behavior: control rooms, blacklist, admin room.

use meshgram::bridge::gate::{command_allowed, is_admin_room};
use meshgram::config::{BlacklistConfig, Config, TelegramConfig};
use meshgram::filter::AccessFilter;

fn telegram_config() -> TelegramConfig {
    TelegramConfig {
        relay_room: -100,
        notifications_room: -101,
        admin_room: 42,
        bot_in_rooms: false,
        ..Config::default().telegram
    }
}

fn filter_banning(user: u64) -> AccessFilter {
    AccessFilter::from_config(&BlacklistConfig {
        telegram_users: vec![user],
        mesh_nodes: vec![],
    })
}

#[test]
fn commands_in_control_rooms_are_rejected() {
    let config = telegram_config();
    let filter = AccessFilter::default();
    assert!(!command_allowed(&config, &filter, -100, Some(7)));
    assert!(!command_allowed(&config, &filter, -101, Some(7)));
    // Anywhere else is fine.
    assert!(command_allowed(&config, &filter, 42, Some(7)));
    assert!(command_allowed(&config, &filter, 7777, Some(7)));
}

#[test]
fn bot_in_rooms_opens_control_rooms() {
    let mut config = telegram_config();
    config.bot_in_rooms = true;
    let filter = AccessFilter::default();
    assert!(command_allowed(&config, &filter, -100, Some(7)));
    assert!(command_allowed(&config, &filter, -101, Some(7)));
}

#[test]
fn banned_users_are_rejected_everywhere() {
    let config = telegram_config();
    let filter = filter_banning(7);
    assert!(!command_allowed(&config, &filter, 42, Some(7)));
    assert!(!command_allowed(&config, &filter, 7777, Some(7)));
    // Other users are unaffected.
    assert!(command_allowed(&config, &filter, 7777, Some(8)));
}

#[test]
fn admin_room_is_exact_match() {
    let config = telegram_config();
    assert!(is_admin_room(&config, 42));
    assert!(!is_admin_room(&config, 43));
    // The admin room being a control room would still gate commands first;
    // the admin check itself only compares ids.
    assert!(!is_admin_room(&config, -100));
}
