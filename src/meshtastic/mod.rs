//! # Mesh Device Connection Module
//!
//! Owns exactly one live session with a Meshtastic radio, reached over a
//! serial port or a TCP socket depending on the configured address form
//! (`tcp:<host>:<port>` vs. a device path). The session is wrapped in an
//! actor task: every other component holds a cloneable [`DeviceHandle`] and
//! talks to the device through its command channel, so the underlying
//! transport is never shared between tasks.
//!
//! ## Operations
//!
//! - broadcast / direct text sends on the primary channel
//! - admin reboot (reboot -> close -> settle delay -> reconnect)
//! - admin node-DB reset
//! - traceroute requests (the firmware applies its configured hop limit)
//! - node-table queries and a device status snapshot
//! - the primary channel's share URL
//!
//! Inbound packets feed the node table and are distilled into [`MeshEvent`]s
//! for the bridge: broadcast text to relay and newly discovered nodes.
//!
//! ## Failure semantics
//!
//! An empty node table is empty, never an error. Reboot has no retry: when
//! the post-settle reconnect fails the error is returned to whoever issued
//! the reboot command, and the device stays disconnected until the next
//! reboot attempt.

pub mod nodes;

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::{debug, info, warn};
use meshtastic::api::{state, ConnectedStreamApi, StreamApi};
use meshtastic::packet::{PacketDestination, PacketRouter};
use meshtastic::protobufs::{self, admin_message, from_radio, mesh_packet, PortNum};
use meshtastic::types::{EncodedMeshPacketData, MeshChannel, NodeId};
use meshtastic::utils;
use meshtastic::Message;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;

use crate::config::MeshtasticConfig;
use crate::logutil::escape_log;
use nodes::{format_node_id, parse_node_id, NodeTable};

/// Primary channel index used for all text traffic.
const PRIMARY_CHANNEL: u32 = 0;

/// Broadcast destination address on the mesh.
const BROADCAST_ADDR: u32 = 0xffff_ffff;

/// Seconds the firmware waits before executing a requested reboot.
const REBOOT_DELAY_SECS: i32 = 10;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("radio error: {0}")]
    Radio(#[from] meshtastic::errors::Error),

    #[error("device is not connected")]
    NotConnected,

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid channel index: {0}")]
    InvalidChannel(u32),

    #[error("device task is gone")]
    TaskGone,
}

/// Event distilled from the inbound packet stream for the bridge.
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// Broadcast text from another node, ready to relay.
    Text {
        from: String,
        long_name: String,
        text: String,
    },
    /// A node appeared in the table after the initial sync.
    NewNode { id: String, long_name: String },
}

/// Point-in-time device summary for /uptime and `check-device`.
#[derive(Debug, Clone, Default)]
pub struct DeviceStatus {
    pub connected: bool,
    pub config_complete: bool,
    pub firmware_version: Option<String>,
    pub reboot_count: Option<u32>,
    pub hop_limit: Option<u32>,
    pub node_count: usize,
    pub our_node_id: Option<u32>,
    pub our_long_name: Option<String>,
}

/// Commands accepted by the device actor.
#[derive(Debug)]
pub enum DeviceCommand {
    /// Broadcast text on the primary channel.
    SendText { text: String },
    /// Direct text to a single node (`!hex` or decimal id).
    SendDirect { dest: String, text: String },
    Reboot {
        respond_to: oneshot::Sender<Result<(), DeviceError>>,
    },
    ResetNodeDb {
        respond_to: oneshot::Sender<Result<(), DeviceError>>,
    },
    Traceroute { dest: String },
    Status {
        respond_to: oneshot::Sender<DeviceStatus>,
    },
    Nodes {
        respond_to: oneshot::Sender<Vec<protobufs::NodeInfo>>,
    },
    ChannelUrl {
        respond_to: oneshot::Sender<Option<String>>,
    },
}

/// Cloneable handle to the device actor.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    tx: mpsc::UnboundedSender<DeviceCommand>,
}

impl DeviceHandle {
    /// Fire-and-forget broadcast. Transport failures are logged by the actor.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.tx.send(DeviceCommand::SendText { text: text.into() });
    }

    /// Fire-and-forget direct message to one node.
    pub fn send_direct(&self, dest: impl Into<String>, text: impl Into<String>) {
        let _ = self.tx.send(DeviceCommand::SendDirect {
            dest: dest.into(),
            text: text.into(),
        });
    }

    /// Reboot the device and wait for the reconnect outcome.
    pub async fn reboot(&self) -> Result<(), DeviceError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(DeviceCommand::Reboot { respond_to: tx })
            .map_err(|_| DeviceError::TaskGone)?;
        rx.await.map_err(|_| DeviceError::TaskGone)?
    }

    /// Reset the device's node DB.
    pub async fn reset_node_db(&self) -> Result<(), DeviceError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(DeviceCommand::ResetNodeDb { respond_to: tx })
            .map_err(|_| DeviceError::TaskGone)?;
        rx.await.map_err(|_| DeviceError::TaskGone)?
    }

    /// Fire-and-forget traceroute; progress is only visible in the logs.
    pub fn traceroute(&self, dest: impl Into<String>) {
        let _ = self.tx.send(DeviceCommand::Traceroute { dest: dest.into() });
    }

    pub async fn status(&self) -> DeviceStatus {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(DeviceCommand::Status { respond_to: tx }).is_err() {
            return DeviceStatus::default();
        }
        rx.await.unwrap_or_default()
    }

    /// Snapshot of the node table. Empty when the actor is gone.
    pub async fn nodes(&self) -> Vec<protobufs::NodeInfo> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(DeviceCommand::Nodes { respond_to: tx }).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn channel_url(&self) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(DeviceCommand::ChannelUrl { respond_to: tx })
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Detached handle + command receiver for tests that assert on the
    /// command stream without a radio.
    #[doc(hidden)]
    pub fn mock() -> (Self, mpsc::UnboundedReceiver<DeviceCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

/// Packet router required by the stream API's send path. Inbound routing is
/// done by the actor loop; this only supplies our node id.
#[derive(Debug, Default)]
struct Router {
    our_num: u32,
}

impl PacketRouter<(), DeviceError> for Router {
    fn handle_packet_from_radio(&mut self, _packet: protobufs::FromRadio) -> Result<(), DeviceError> {
        Ok(())
    }

    fn handle_mesh_packet(&mut self, _packet: protobufs::MeshPacket) -> Result<(), DeviceError> {
        Ok(())
    }

    fn source_node_id(&self) -> NodeId {
        self.our_num.into()
    }
}

/// One live connection to a Meshtastic radio plus the state learned from its
/// packet stream.
pub struct MeshDevice {
    address: String,
    baud_rate: u32,
    settle: Duration,
    api: Option<ConnectedStreamApi<state::Configured>>,
    listener: Option<mpsc::UnboundedReceiver<protobufs::FromRadio>>,
    router: Router,
    table: NodeTable,
    config_request_id: u32,
    config_complete: bool,
    firmware_version: Option<String>,
    reboot_count: Option<u32>,
    lora: Option<protobufs::config::LoRaConfig>,
    channels: Vec<protobufs::Channel>,
}

impl MeshDevice {
    pub fn new(config: &MeshtasticConfig) -> Self {
        Self {
            address: config.device.clone(),
            baud_rate: config.baud_rate,
            settle: Duration::from_secs(config.reboot_settle_secs),
            api: None,
            listener: None,
            router: Router::default(),
            table: NodeTable::new(),
            config_request_id: 0,
            config_complete: false,
            firmware_version: None,
            reboot_count: None,
            lora: None,
            channels: Vec::new(),
        }
    }

    /// Establish a fresh device session. Callable repeatedly; each call
    /// attempts a new connection regardless of prior state.
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        let stream_api = StreamApi::new();
        let (listener, connected) = if let Some(addr) = self.address.strip_prefix("tcp:") {
            info!("Connecting to Meshtastic device over TCP at {addr}");
            let stream = utils::stream::build_tcp_stream(addr.to_string()).await?;
            stream_api.connect(stream).await
        } else {
            info!("Connecting to Meshtastic device on {}", self.address);
            let stream = utils::stream::build_serial_stream(
                self.address.clone(),
                Some(self.baud_rate),
                None,
                None,
            )?;
            stream_api.connect(stream).await
        };

        let config_id = utils::generate_rand_id();
        let api = connected.configure(config_id).await?;

        self.api = Some(api);
        self.listener = Some(listener);
        self.config_request_id = config_id;
        self.config_complete = false;
        Ok(())
    }

    /// Close the current session, if any.
    pub async fn disconnect(&mut self) {
        self.listener = None;
        if let Some(api) = self.api.take() {
            if let Err(e) = api.disconnect().await {
                warn!("Error while closing device session: {e}");
            }
        }
    }

    fn primary_channel() -> Result<MeshChannel, DeviceError> {
        MeshChannel::try_from(PRIMARY_CHANNEL)
            .map_err(|_| DeviceError::InvalidChannel(PRIMARY_CHANNEL))
    }

    /// Broadcast text on the primary channel.
    pub async fn send_text(&mut self, text: &str) -> Result<(), DeviceError> {
        let api = self.api.as_mut().ok_or(DeviceError::NotConnected)?;
        api.send_text(
            &mut self.router,
            text.to_string(),
            PacketDestination::Broadcast,
            false,
            Self::primary_channel()?,
        )
        .await?;
        Ok(())
    }

    /// Direct text to a single node.
    pub async fn send_direct(&mut self, dest: &str, text: &str) -> Result<(), DeviceError> {
        let num = parse_node_id(dest).ok_or_else(|| DeviceError::InvalidNodeId(dest.to_string()))?;
        let api = self.api.as_mut().ok_or(DeviceError::NotConnected)?;
        api.send_text(
            &mut self.router,
            text.to_string(),
            PacketDestination::Node(num.into()),
            true,
            Self::primary_channel()?,
        )
        .await?;
        Ok(())
    }

    async fn send_admin(
        &mut self,
        payload: admin_message::PayloadVariant,
    ) -> Result<(), DeviceError> {
        let api = self.api.as_mut().ok_or(DeviceError::NotConnected)?;
        let admin = protobufs::AdminMessage {
            payload_variant: Some(payload),
            ..Default::default()
        };
        let data: EncodedMeshPacketData = admin.encode_to_vec().into();
        api.send_mesh_packet(
            &mut self.router,
            data,
            PortNum::AdminApp,
            PacketDestination::Local,
            Self::primary_channel()?,
            true,
            false,
            false,
            None,
            None,
        )
        .await?;
        Ok(())
    }

    /// Reboot the local node: admin reboot, close the session, wait the
    /// settle delay, reconnect. No retry; a failed reconnect is the caller's
    /// problem to surface.
    pub async fn reboot(&mut self) -> Result<(), DeviceError> {
        info!("Reboot requested, settling {}s before reconnect", self.settle.as_secs());
        self.send_admin(admin_message::PayloadVariant::RebootSeconds(REBOOT_DELAY_SECS))
            .await?;
        self.disconnect().await;
        sleep(self.settle).await;
        self.connect().await?;
        info!("Reboot completed, device session re-established");
        Ok(())
    }

    /// Ask the local node to clear its node DB.
    pub async fn reset_node_db(&mut self) -> Result<(), DeviceError> {
        info!("Node DB reset requested");
        self.send_admin(admin_message::PayloadVariant::NodedbReset(true)).await
    }

    /// Issue a traceroute request. The firmware applies its configured LoRa
    /// hop limit; we log the limit we learned from the config stream.
    pub async fn traceroute(&mut self, dest: &str) -> Result<(), DeviceError> {
        let num = parse_node_id(dest).ok_or_else(|| DeviceError::InvalidNodeId(dest.to_string()))?;
        let hop_limit = self.lora.as_ref().map(|l| l.hop_limit);
        info!(
            "Sending traceroute request to {} (hop limit {:?}, this can take a while)",
            format_node_id(num),
            hop_limit
        );
        let api = self.api.as_mut().ok_or(DeviceError::NotConnected)?;
        let payload: EncodedMeshPacketData = protobufs::RouteDiscovery::default()
            .encode_to_vec()
            .into();
        api.send_mesh_packet(
            &mut self.router,
            payload,
            PortNum::TracerouteApp,
            PacketDestination::Node(num.into()),
            Self::primary_channel()?,
            true,
            true,
            false,
            None,
            None,
        )
        .await?;
        Ok(())
    }

    /// Share URL of the primary channel, once the config stream delivered it.
    pub fn channel_url(&self) -> Option<String> {
        let primary = self
            .channels
            .iter()
            .find(|c| c.role() == protobufs::channel::Role::Primary)?;
        let set = protobufs::ChannelSet {
            settings: primary.settings.clone().into_iter().collect(),
            lora_config: self.lora.clone(),
            ..Default::default()
        };
        Some(format!(
            "https://meshtastic.org/e/#{}",
            URL_SAFE_NO_PAD.encode(set.encode_to_vec())
        ))
    }

    pub fn config_complete(&self) -> bool {
        self.config_complete
    }

    pub fn node_count(&self) -> usize {
        self.table.len()
    }

    fn our_long_name(&self) -> Option<String> {
        let num = self.router.our_num;
        if num == 0 {
            return None;
        }
        let name = self.table.long_name(num);
        (name != format_node_id(num)).then_some(name)
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            connected: self.api.is_some(),
            config_complete: self.config_complete,
            firmware_version: self.firmware_version.clone(),
            reboot_count: self.reboot_count,
            hop_limit: self.lora.as_ref().map(|l| l.hop_limit),
            node_count: self.table.len(),
            our_node_id: (self.router.our_num != 0).then_some(self.router.our_num),
            our_long_name: self.our_long_name(),
        }
    }

    /// Receive the next raw packet from the device, or None when the session
    /// is gone. Used by the `check-device` probe; the actor loop drains the
    /// same listener non-blockingly.
    pub async fn next_packet(&mut self) -> Option<protobufs::FromRadio> {
        match self.listener.as_mut() {
            Some(listener) => listener.recv().await,
            None => None,
        }
    }

    /// Fold one inbound packet into device state, returning a bridge event
    /// when the packet is worth relaying.
    pub fn handle_from_radio(&mut self, packet: protobufs::FromRadio) -> Option<MeshEvent> {
        match packet.payload_variant? {
            from_radio::PayloadVariant::MyInfo(info) => {
                self.router.our_num = info.my_node_num;
                self.reboot_count = Some(info.reboot_count);
                None
            }
            from_radio::PayloadVariant::Metadata(meta) => {
                self.firmware_version = Some(meta.firmware_version);
                None
            }
            from_radio::PayloadVariant::Config(cfg) => {
                if let Some(protobufs::config::PayloadVariant::Lora(lora)) = cfg.payload_variant {
                    self.lora = Some(lora);
                }
                None
            }
            from_radio::PayloadVariant::Channel(ch) => {
                self.channels.retain(|c| c.index != ch.index);
                self.channels.push(ch);
                None
            }
            from_radio::PayloadVariant::ConfigCompleteId(id) => {
                if id == self.config_request_id {
                    self.config_complete = true;
                    info!("Initial device sync complete: {} nodes known", self.table.len());
                }
                None
            }
            from_radio::PayloadVariant::NodeInfo(info) => {
                let num = info.num;
                let is_new = self.table.upsert(info);
                if is_new && self.config_complete && num != self.router.our_num {
                    Some(MeshEvent::NewNode {
                        id: format_node_id(num),
                        long_name: self.table.long_name(num),
                    })
                } else {
                    None
                }
            }
            from_radio::PayloadVariant::Packet(packet) => self.handle_mesh_packet(packet),
            _ => None,
        }
    }

    fn handle_mesh_packet(&mut self, packet: protobufs::MeshPacket) -> Option<MeshEvent> {
        let Some(mesh_packet::PayloadVariant::Decoded(data)) = packet.payload_variant else {
            return None;
        };
        if data.portnum() != PortNum::TextMessageApp {
            return None;
        }
        if packet.from == self.router.our_num {
            return None;
        }
        if packet.to != BROADCAST_ADDR {
            debug!("Ignoring direct mesh text from {}", format_node_id(packet.from));
            return None;
        }
        let text = String::from_utf8_lossy(&data.payload).to_string();
        // Some nodes rebroadcast our own relays verbatim; they arrive
        // prefixed with our long name.
        if let Some(name) = self.our_long_name() {
            if text.starts_with(&name) {
                debug!("Dropping mesh echo of our own relay: {}", escape_log(&text));
                return None;
            }
        }
        Some(MeshEvent::Text {
            from: format_node_id(packet.from),
            long_name: self.table.long_name(packet.from),
            text,
        })
    }

    async fn handle_command(&mut self, cmd: DeviceCommand) {
        match cmd {
            DeviceCommand::SendText { text } => {
                if let Err(e) = self.send_text(&text).await {
                    warn!("Failed to send to mesh: {e}");
                }
            }
            DeviceCommand::SendDirect { dest, text } => {
                if let Err(e) = self.send_direct(&dest, &text).await {
                    warn!("Failed to send direct to {dest}: {e}");
                }
            }
            DeviceCommand::Reboot { respond_to } => {
                let result = self.reboot().await;
                if let Err(e) = &result {
                    warn!("Reboot failed: {e}");
                }
                let _ = respond_to.send(result);
            }
            DeviceCommand::ResetNodeDb { respond_to } => {
                let result = self.reset_node_db().await;
                let _ = respond_to.send(result);
            }
            DeviceCommand::Traceroute { dest } => {
                if let Err(e) = self.traceroute(&dest).await {
                    warn!("Traceroute to {dest} failed: {e}");
                }
            }
            DeviceCommand::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
            DeviceCommand::Nodes { respond_to } => {
                let list = self
                    .table
                    .nodes_with_info()
                    .into_iter()
                    .cloned()
                    .collect();
                let _ = respond_to.send(list);
            }
            DeviceCommand::ChannelUrl { respond_to } => {
                let _ = respond_to.send(self.channel_url());
            }
        }
    }
}

/// Spawn the device actor. The returned handle is the only way to reach the
/// connection; the event receiver carries relayable mesh traffic.
pub fn spawn(device: MeshDevice) -> (DeviceHandle, mpsc::UnboundedReceiver<MeshEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_device(device, cmd_rx, event_tx));
    (DeviceHandle { tx: cmd_tx }, event_rx)
}

async fn run_device(
    mut device: MeshDevice,
    mut commands: mpsc::UnboundedReceiver<DeviceCommand>,
    events: mpsc::UnboundedSender<MeshEvent>,
) {
    const TICK: Duration = Duration::from_millis(50);
    loop {
        // Drain whatever the radio produced since the last pass.
        loop {
            let packet = match device.listener.as_mut() {
                None => break,
                Some(listener) => match listener.try_recv() {
                    Ok(packet) => Some(packet),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => None,
                },
            };
            match packet {
                Some(packet) => {
                    if let Some(event) = device.handle_from_radio(packet) {
                        let _ = events.send(event);
                    }
                }
                None => {
                    warn!("Device packet stream closed");
                    device.listener = None;
                }
            }
        }

        match tokio::time::timeout(TICK, commands.recv()).await {
            Ok(Some(cmd)) => device.handle_command(cmd).await,
            Ok(None) => break,
            Err(_) => {} // tick; fall through to drain the radio again
        }
    }
    debug!("device task terminated");
}
