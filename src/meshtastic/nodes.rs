//! Node table and its derived views.
//!
//! The table mirrors the device's live node DB, fed from the `FromRadio`
//! packet stream. Every view is computed fresh on each call; nothing here is
//! cached, so a query always reflects the table as of now.

use std::collections::HashMap;

use meshtastic::protobufs::NodeInfo;
use teloxide::utils::markdown;

/// Live node table, keyed by node number.
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: HashMap<u32, NodeInfo>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert or refresh a node record. Returns true when the node number
    /// was not present before.
    pub fn upsert(&mut self, info: NodeInfo) -> bool {
        self.nodes.insert(info.num, info).is_none()
    }

    /// Raw mapping of node number -> info. Empty when the device reported
    /// nothing, never an error.
    pub fn nodes(&self) -> &HashMap<u32, NodeInfo> {
        &self.nodes
    }

    /// Materialized sequence of node records, ordered by node number.
    pub fn nodes_with_info(&self) -> Vec<&NodeInfo> {
        let mut list: Vec<&NodeInfo> = self.nodes.values().collect();
        list.sort_by_key(|n| n.num);
        list
    }

    /// Nodes carrying a position record.
    pub fn nodes_with_position(&self) -> Vec<&NodeInfo> {
        self.nodes_with_info()
            .into_iter()
            .filter(|n| n.position.is_some())
            .collect()
    }

    /// Nodes carrying both a position and user metadata.
    pub fn nodes_with_user(&self) -> Vec<&NodeInfo> {
        self.nodes_with_position()
            .into_iter()
            .filter(|n| n.user.is_some())
            .collect()
    }

    /// Best display name for a node: its long name when known, otherwise the
    /// `!hex` id.
    pub fn long_name(&self, num: u32) -> String {
        self.nodes
            .get(&num)
            .and_then(|n| n.user.as_ref())
            .map(|u| u.long_name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format_node_id(num))
    }
}

/// Canonical `!hex` rendering of a node number.
pub fn format_node_id(num: u32) -> String {
    format!("!{num:08x}")
}

/// Parse a node destination: `!hex` or plain decimal.
pub fn parse_node_id(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('!') {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Render the node listing as MarkdownV2. One node per line; every markup
/// entity stays inside its line, which is what keeps chunked sends valid.
pub fn format_nodes(nodes: &[NodeInfo], include_self: bool, our_num: Option<u32>) -> String {
    let nodes: Vec<&NodeInfo> = nodes
        .iter()
        .filter(|n| include_self || Some(n.num) != our_num)
        .collect();

    let mut out = format!("*{} nodes*", nodes.len());
    for node in nodes {
        let id = format_node_id(node.num);
        let name = node
            .user
            .as_ref()
            .map(|u| u.long_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.clone());
        let mut line = format!("\n• *{}* `{}`", markdown::escape(&name), id);
        if let Some(user) = node.user.as_ref() {
            line.push(' ');
            line.push_str(&markdown::escape(&format!("{:?}", user.hw_model())));
        }
        if let Some(pos) = node.position.as_ref() {
            let lat = pos.latitude_i.unwrap_or_default() as f64 * 1e-7;
            let lon = pos.longitude_i.unwrap_or_default() as f64 * 1e-7;
            line.push(' ');
            line.push_str(&markdown::escape(&format!("({lat:.4}, {lon:.4})")));
        }
        out.push_str(&line);
    }
    out
}
