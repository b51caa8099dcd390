use meshtastic::protobufs::{self, from_radio, mesh_packet};
use meshtastic::Message;
use serde::Serialize;

use crate::error::{RadioError, Result};

/// One message received from the radio.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DecodedMessage {
    /// The connected device's own identity.
    MyInfo(protobufs::MyNodeInfo),
    NodeInfo(protobufs::NodeInfo),
    Channel(protobufs::Channel),
    Config(protobufs::Config),
    ModuleConfig(protobufs::ModuleConfig),
    LogRecord(protobufs::LogRecord),
    QueueStatus(protobufs::QueueStatus),
    Packet(MeshPacket),
    Rebooted(bool),
    ConfigComplete(u32),
    FileInfo(protobufs::FileInfo),
    Metadata(protobufs::DeviceMetadata),
    /// A variant the engine does not interpret, kept as received.
    Other(protobufs::FromRadio),
}

impl DecodedMessage {
    /// Deserialize a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let from_radio =
            protobufs::FromRadio::decode(payload).map_err(|e| RadioError::Decode(Box::new(e)))?;
        Ok(from_radio.into())
    }

    /// Node number reported by an identity message, if populated.
    pub fn my_node_num(&self) -> Option<u32> {
        match self {
            Self::MyInfo(info) if info.my_node_num != 0 => Some(info.my_node_num),
            _ => None,
        }
    }
}

impl From<protobufs::FromRadio> for DecodedMessage {
    fn from(from_radio: protobufs::FromRadio) -> Self {
        let Some(variant) = from_radio.payload_variant.clone() else {
            return Self::Other(from_radio);
        };

        match variant {
            from_radio::PayloadVariant::MyInfo(info) => Self::MyInfo(info),
            from_radio::PayloadVariant::NodeInfo(node) => Self::NodeInfo(node),
            from_radio::PayloadVariant::Channel(channel) => Self::Channel(channel),
            from_radio::PayloadVariant::Config(config) => Self::Config(config),
            from_radio::PayloadVariant::ModuleConfig(config) => Self::ModuleConfig(config),
            from_radio::PayloadVariant::LogRecord(record) => Self::LogRecord(record),
            from_radio::PayloadVariant::QueueStatus(status) => Self::QueueStatus(status),
            from_radio::PayloadVariant::Packet(packet) => Self::Packet(packet.into()),
            from_radio::PayloadVariant::Rebooted(rebooted) => Self::Rebooted(rebooted),
            from_radio::PayloadVariant::ConfigCompleteId(id) => Self::ConfigComplete(id),
            from_radio::PayloadVariant::FileInfo(info) => Self::FileInfo(info),
            from_radio::PayloadVariant::Metadata(metadata) => Self::Metadata(metadata),
            _ => Self::Other(from_radio),
        }
    }
}

/// A routed packet between mesh nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshPacket {
    pub from: u32,
    pub to: u32,
    pub channel: u32,
    pub id: u32,
    pub hop_limit: u32,
    pub rx_rssi: i32,
    pub rx_snr: f32,
    /// Seconds since the Unix epoch, 0 when unknown.
    pub rx_time: u32,
    /// `None` for packets still encrypted for another channel.
    pub payload: Option<AppPayload>,
}

/// Decoded application data carried by a [`MeshPacket`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppPayload {
    pub port: protobufs::PortNum,
    pub bytes: Vec<u8>,
}

impl From<protobufs::MeshPacket> for MeshPacket {
    fn from(packet: protobufs::MeshPacket) -> Self {
        let payload = match packet.payload_variant {
            Some(mesh_packet::PayloadVariant::Decoded(data)) => Some(AppPayload {
                port: data.portnum(),
                bytes: data.payload,
            }),
            _ => None,
        };

        Self {
            from: packet.from,
            to: packet.to,
            channel: packet.channel,
            id: packet.id,
            hop_limit: packet.hop_limit,
            rx_rssi: packet.rx_rssi,
            rx_snr: packet.rx_snr,
            rx_time: packet.rx_time,
            payload,
        }
    }
}
