//! Blacklist membership checks.
//!
//! One set covers both transports: Telegram user IDs are stored as decimal
//! strings, mesh node IDs in their native `!hex` form. The set is built once
//! from configuration and never mutated afterwards.

use std::collections::HashSet;

use crate::config::BlacklistConfig;

/// Read-only ban list consulted by the bridge before any relay or command.
#[derive(Debug, Clone, Default)]
pub struct AccessFilter {
    banned: HashSet<String>,
}

impl AccessFilter {
    pub fn from_config(config: &BlacklistConfig) -> Self {
        let mut banned = HashSet::new();
        for id in &config.telegram_users {
            banned.insert(id.to_string());
        }
        for id in &config.mesh_nodes {
            banned.insert(id.to_lowercase());
        }
        Self { banned }
    }

    /// Pure membership test. Mesh IDs compare case-insensitively since the
    /// firmware prints them in either case.
    pub fn banned(&self, id: &str) -> bool {
        if id.starts_with('!') {
            self.banned.contains(&id.to_lowercase())
        } else {
            self.banned.contains(id)
        }
    }
}
