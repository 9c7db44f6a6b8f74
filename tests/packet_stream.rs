//! Folding the inbound packet stream into device state and relay events.
//! Exercises the device without a radio: packets are handed to the fold
//! directly.

use meshgram::config::Config;
use meshgram::meshtastic::{MeshDevice, MeshEvent};
use meshtastic::protobufs::{
    self, from_radio, mesh_packet, Data, DeviceMetadata, MeshPacket, MyNodeInfo, NodeInfo,
    PortNum, User,
};

const BROADCAST: u32 = 0xffff_ffff;

fn device() -> MeshDevice {
    MeshDevice::new(&Config::default().meshtastic)
}

fn packet(v: from_radio::PayloadVariant) -> protobufs::FromRadio {
    protobufs::FromRadio {
        payload_variant: Some(v),
        ..Default::default()
    }
}

fn node_info(num: u32, long_name: &str) -> protobufs::FromRadio {
    packet(from_radio::PayloadVariant::NodeInfo(NodeInfo {
        num,
        user: Some(User {
            id: format!("!{num:08x}"),
            long_name: long_name.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }))
}

fn text_packet(from: u32, to: u32, text: &str) -> protobufs::FromRadio {
    packet(from_radio::PayloadVariant::Packet(MeshPacket {
        from,
        to,
        payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
            portnum: PortNum::TextMessageApp as i32,
            payload: text.as_bytes().to_vec(),
            ..Default::default()
        })),
        ..Default::default()
    }))
}

#[test]
fn broadcast_text_becomes_a_relay_event() {
    let mut dev = device();
    assert!(dev.handle_from_radio(node_info(7, "Scout")).is_none());

    let event = dev.handle_from_radio(text_packet(7, BROADCAST, "hello mesh"));
    match event {
        Some(MeshEvent::Text {
            from,
            long_name,
            text,
        }) => {
            assert_eq!(from, "!00000007");
            assert_eq!(long_name, "Scout");
            assert_eq!(text, "hello mesh");
        }
        other => panic!("expected text event, got {other:?}"),
    }
}

#[test]
fn unknown_sender_falls_back_to_hex_id() {
    let mut dev = device();
    match dev.handle_from_radio(text_packet(0xab, BROADCAST, "hi")) {
        Some(MeshEvent::Text { long_name, .. }) => assert_eq!(long_name, "!000000ab"),
        other => panic!("expected text event, got {other:?}"),
    }
}

#[test]
fn direct_mesh_text_is_not_relayed() {
    let mut dev = device();
    assert!(dev.handle_from_radio(text_packet(7, 99, "psst")).is_none());
}

#[test]
fn own_packets_are_ignored() {
    let mut dev = device();
    let my_info = MyNodeInfo {
        my_node_num: 42,
        ..Default::default()
    };
    dev.handle_from_radio(packet(from_radio::PayloadVariant::MyInfo(my_info)));
    assert!(dev.handle_from_radio(text_packet(42, BROADCAST, "loop")).is_none());
}

#[test]
fn relay_echoes_from_other_nodes_are_dropped() {
    let mut dev = device();
    let my_info = MyNodeInfo {
        my_node_num: 42,
        ..Default::default()
    };
    dev.handle_from_radio(packet(from_radio::PayloadVariant::MyInfo(my_info)));
    dev.handle_from_radio(node_info(42, "Bridge"));

    // Another node rebroadcasts our own relay verbatim.
    assert!(dev
        .handle_from_radio(text_packet(7, BROADCAST, "Bridge relayed this"))
        .is_none());
    // Genuine traffic still flows.
    assert!(dev
        .handle_from_radio(text_packet(7, BROADCAST, "actual message"))
        .is_some());
}

#[test]
fn new_nodes_notify_only_after_initial_sync() {
    let mut dev = device();
    // During the initial download nothing is "new".
    assert!(dev.handle_from_radio(node_info(1, "Early")).is_none());

    dev.handle_from_radio(packet(from_radio::PayloadVariant::ConfigCompleteId(0)));
    assert!(dev.config_complete());

    match dev.handle_from_radio(node_info(2, "Latecomer")) {
        Some(MeshEvent::NewNode { id, long_name }) => {
            assert_eq!(id, "!00000002");
            assert_eq!(long_name, "Latecomer");
        }
        other => panic!("expected new-node event, got {other:?}"),
    }
    // Seen nodes never notify again.
    assert!(dev.handle_from_radio(node_info(2, "Latecomer")).is_none());
}

#[test]
fn status_reflects_stream_metadata() {
    let mut dev = device();
    dev.handle_from_radio(packet(from_radio::PayloadVariant::MyInfo(MyNodeInfo {
        my_node_num: 42,
        reboot_count: 3,
        ..Default::default()
    })));
    dev.handle_from_radio(packet(from_radio::PayloadVariant::Metadata(DeviceMetadata {
        firmware_version: "2.3.2".to_string(),
        ..Default::default()
    })));
    dev.handle_from_radio(node_info(7, "Scout"));

    let status = dev.status();
    assert_eq!(status.our_node_id, Some(42));
    assert_eq!(status.reboot_count, Some(3));
    assert_eq!(status.firmware_version.as_deref(), Some("2.3.2"));
    assert_eq!(status.node_count, 1);
    assert!(!status.connected);
}
