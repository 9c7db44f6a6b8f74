//! Node table views and listing format.

use meshgram::meshtastic::nodes::{format_node_id, format_nodes, parse_node_id, NodeTable};
use meshtastic::protobufs::{NodeInfo, Position, User};

fn node(num: u32, name: &str, with_pos: bool, with_user: bool) -> NodeInfo {
    NodeInfo {
        num,
        user: with_user.then(|| User {
            id: format_node_id(num),
            long_name: name.to_string(),
            ..Default::default()
        }),
        position: with_pos.then(|| Position {
            latitude_i: Some(520_000_000),
            longitude_i: Some(139_000_000),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn sample_table() -> NodeTable {
    let mut table = NodeTable::new();
    table.upsert(node(1, "Alpha", true, true));
    table.upsert(node(2, "Bravo", true, false));
    table.upsert(node(3, "Charlie", false, true));
    table.upsert(node(4, "", false, false));
    table
}

#[test]
fn views_filter_progressively() {
    let table = sample_table();
    assert_eq!(table.nodes_with_info().len(), 4);
    assert_eq!(table.nodes_with_position().len(), 2);
    // position AND user metadata
    assert_eq!(table.nodes_with_user().len(), 1);
    assert_eq!(table.nodes_with_user()[0].num, 1);
}

#[test]
fn empty_table_is_empty_not_an_error() {
    let table = NodeTable::new();
    assert!(table.is_empty());
    assert!(table.nodes_with_info().is_empty());
    assert!(table.nodes_with_position().is_empty());
}

#[test]
fn upsert_reports_new_nodes_once() {
    let mut table = NodeTable::new();
    assert!(table.upsert(node(9, "Ida", false, true)));
    assert!(!table.upsert(node(9, "Ida renamed", false, true)));
    assert_eq!(table.long_name(9), "Ida renamed");
}

#[test]
fn long_name_falls_back_to_hex_id() {
    let table = sample_table();
    assert_eq!(table.long_name(1), "Alpha");
    assert_eq!(table.long_name(4), "!00000004");
    assert_eq!(table.long_name(999), "!000003e7");
}

#[test]
fn node_id_parsing_roundtrips() {
    assert_eq!(parse_node_id("!00000fff"), Some(0xfff));
    assert_eq!(parse_node_id("4095"), Some(4095));
    assert_eq!(parse_node_id(format_node_id(0xdeadbeef).as_str()), Some(0xdeadbeef));
    assert_eq!(parse_node_id("!xyz"), None);
    assert_eq!(parse_node_id(""), None);
}

#[test]
fn listing_respects_include_self() {
    let table = sample_table();
    let nodes: Vec<NodeInfo> = table.nodes_with_info().into_iter().cloned().collect();

    let with_self = format_nodes(&nodes, true, Some(1));
    assert!(with_self.starts_with("*4 nodes*"));
    assert!(with_self.contains("Alpha"));

    let without_self = format_nodes(&nodes, false, Some(1));
    assert!(without_self.starts_with("*3 nodes*"));
    assert!(!without_self.contains("Alpha"));
    assert!(without_self.contains("Bravo"));
}

#[test]
fn listing_keeps_entities_within_lines() {
    let table = sample_table();
    let nodes: Vec<NodeInfo> = table.nodes_with_info().into_iter().cloned().collect();
    for line in format_nodes(&nodes, true, None).lines() {
        assert_eq!(line.matches('*').count() % 2, 0, "unbalanced bold in {line:?}");
        assert_eq!(line.matches('`').count() % 2, 0, "unbalanced code in {line:?}");
    }
}
