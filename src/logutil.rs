//! Logging helpers: single-line escaping for user-supplied text and a small
//! humanized duration formatter for the /uptime reply.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///   Truncates long strings (over `MAX_PREVIEW` chars) with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 200;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Humanize a duration since some past instant: "just now", "5 minutes ago",
/// "2 hours ago", "3 days ago".
pub fn humanize_since(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    let (value, unit) = match secs {
        0..=9 => return "just now".to_string(),
        10..=89 => (secs, "second"),
        90..=5399 => (secs / 60, "minute"),
        5400..=172_799 => (secs / 3600, "hour"),
        _ => (secs / 86_400, "day"),
    };
    if value == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn escapes_newlines() {
        let s = "Line1\nLine2\r\tEnd";
        assert_eq!(escape_log(s), "Line1\\nLine2\\r\\tEnd");
    }

    #[test]
    fn truncates_long_input() {
        let s = "x".repeat(500);
        let out = escape_log(&s);
        assert!(out.ends_with('…'));
        assert!(out.chars().count() <= 201);
    }

    #[test]
    fn humanizes_common_ranges() {
        assert_eq!(humanize_since(Duration::from_secs(3)), "just now");
        assert_eq!(humanize_since(Duration::from_secs(45)), "45 seconds ago");
        assert_eq!(humanize_since(Duration::from_secs(180)), "3 minutes ago");
        assert_eq!(humanize_since(Duration::from_secs(7200)), "2 hours ago");
        assert_eq!(humanize_since(Duration::from_secs(86_400 * 3)), "3 days ago");
    }

    #[test]
    fn humanize_singular_units() {
        assert_eq!(humanize_since(Duration::from_secs(60)), "1 minute ago");
        assert_eq!(humanize_since(Duration::from_secs(90 * 60)), "1 hour ago");
    }
}
