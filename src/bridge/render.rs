//! Text assembly for the relay path and the informational commands.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::logutil::humanize_since;
use crate::meshtastic::DeviceStatus;

/// Reply to /start.
pub const GREETING: &str = "I'm a bot, please talk to me!";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version requirement of the meshtastic library, embedded by build.rs.
pub const MESHLIB_VERSION: &str = env!("MESHTASTIC_LIB_VERSION");

/// Sender display name: first name, plus the last name when present.
pub fn display_name(first_name: &str, last_name: Option<&str>) -> String {
    match last_name {
        Some(last) if !last.is_empty() => format!("{first_name} {last}"),
        _ => first_name.to_string(),
    }
}

/// Body of a relayed chat message: the text when present, plus a synthesized
/// description when the message carries a sticker. None when neither applies
/// (unsupported message types are dropped).
pub fn echo_body(text: Option<&str>, sticker: Option<(&str, &str)>) -> Option<String> {
    let mut body = String::new();
    if let Some(text) = text {
        body.push_str(text);
    }
    if let Some((set_name, emoji)) = sticker {
        body.push_str(&format!("sent sticker {set_name}: {emoji}"));
    }
    (!body.is_empty()).then_some(body)
}

/// Full forwarded line, `"<display name>: <body>"`, or None when there is
/// nothing to forward.
pub fn render_forward(
    display_name: &str,
    text: Option<&str>,
    sticker: Option<(&str, &str)>,
) -> Option<String> {
    echo_body(text, sticker).map(|body| format!("{display_name}: {body}"))
}

/// The /uptime reply line.
pub fn render_uptime(status: &DeviceStatus, since_start: Duration) -> String {
    let firmware = status.firmware_version.as_deref().unwrap_or("unknown");
    let reboots = status
        .reboot_count
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Bot v{VERSION}/FW: v{firmware}/Meshlib: v{MESHLIB_VERSION}/Reboots: {reboots}. Started {}",
        humanize_since(since_start)
    )
}

static RANGE_TEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^seq\s+[0-9]+").expect("range test regex"));

/// Range-test frames ("seq 123") must not spam the relay room.
pub fn is_range_test(text: &str) -> bool {
    RANGE_TEST.is_match(text)
}
