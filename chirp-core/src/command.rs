//! Builders for the messages the engine sends to the radio.
//!
//! Each builder validates its input and returns a message ready to be
//! serialized and framed; none of them perform I/O.

use meshtastic::protobufs::{self, admin_message, config, mesh_packet, to_radio};
use meshtastic::Message;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::ValidationError;

/// Destination that reaches every node on the channel.
pub const BROADCAST_NUM: u32 = 0xFFFF_FFFF;

pub const DEFAULT_HOP_LIMIT: u32 = 3;

/// Longest text payload accepted, in bytes.
pub const MAX_TEXT_LEN: usize = 240;

pub const SHORT_NAME_LEN: usize = 3;

/// Identifier sent with the full configuration request.
pub const RADIO_INFO_CONFIG_ID: u32 = 42;

/// Upper bound (inclusive) for generated packet ids.
pub const MAX_PACKET_ID: u32 = 2_386_827;

/// Modem preset shorthand accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, IntoStaticStr)]
pub enum ModemMode {
    #[strum(serialize = "lf")]
    LongFast,
    #[strum(serialize = "ls")]
    LongSlow,
    #[strum(serialize = "vls")]
    VeryLongSlow,
    #[strum(serialize = "ms")]
    MediumSlow,
    #[strum(serialize = "mf")]
    MediumFast,
    #[strum(serialize = "sl")]
    ShortSlow,
    #[strum(serialize = "sf")]
    ShortFast,
    #[strum(serialize = "lm")]
    LongModerate,
}

impl ModemMode {
    /// Parse a mode code, case-insensitively and ignoring surrounding space.
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        let normalized = code.trim().to_lowercase();
        normalized
            .parse()
            .map_err(|_| ValidationError::InvalidModemMode {
                mode: code.to_string(),
                valid: Self::valid_codes(),
            })
    }

    /// All accepted codes, `|`-separated.
    pub fn valid_codes() -> String {
        Self::iter()
            .map(|mode| mode.code())
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn code(self) -> &'static str {
        self.into()
    }

    #[allow(deprecated)]
    pub fn preset(self) -> config::lo_ra_config::ModemPreset {
        use config::lo_ra_config::ModemPreset;
        match self {
            Self::LongFast => ModemPreset::LongFast,
            Self::LongSlow => ModemPreset::LongSlow,
            Self::VeryLongSlow => ModemPreset::VeryLongSlow,
            Self::MediumSlow => ModemPreset::MediumSlow,
            Self::MediumFast => ModemPreset::MediumFast,
            Self::ShortSlow => ModemPreset::ShortSlow,
            Self::ShortFast => ModemPreset::ShortFast,
            Self::LongModerate => ModemPreset::LongModerate,
        }
    }
}

/// Text message to `destination` (0 broadcasts) on `channel`.
pub fn text_message(
    text: &str,
    destination: u32,
    channel: u32,
    packet_id: u32,
) -> Result<protobufs::ToRadio, ValidationError> {
    if text.len() > MAX_TEXT_LEN {
        return Err(ValidationError::MessageTooLarge {
            len: text.len(),
            max: MAX_TEXT_LEN,
        });
    }

    let to = if destination == 0 {
        BROADCAST_NUM
    } else {
        destination
    };

    let packet = protobufs::MeshPacket {
        to,
        want_ack: true,
        id: packet_id,
        channel,
        hop_limit: DEFAULT_HOP_LIMIT,
        payload_variant: Some(mesh_packet::PayloadVariant::Decoded(protobufs::Data {
            portnum: protobufs::PortNum::TextMessageApp as i32,
            payload: text.as_bytes().to_vec(),
            ..Default::default()
        })),
        ..Default::default()
    };

    Ok(packet_message(packet))
}

/// Set the device owner. The short name is the first three bytes of `name`,
/// cut back to a character boundary.
pub fn set_owner(name: &str) -> Result<protobufs::AdminMessage, ValidationError> {
    if name.len() < SHORT_NAME_LEN {
        return Err(ValidationError::NameTooShort { len: name.len() });
    }

    let mut cut = SHORT_NAME_LEN;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }

    let user = protobufs::User {
        long_name: name.to_string(),
        short_name: name[..cut].to_string(),
        ..Default::default()
    };

    Ok(admin(admin_message::PayloadVariant::SetOwner(user)))
}

pub fn set_modem_preset(mode: ModemMode) -> protobufs::AdminMessage {
    let lora = config::LoRaConfig {
        modem_preset: mode.preset() as i32,
        ..Default::default()
    };

    admin(admin_message::PayloadVariant::SetConfig(protobufs::Config {
        payload_variant: Some(config::PayloadVariant::Lora(lora)),
    }))
}

/// Fixed position for `node_num`. Coordinates are 1e-7 degree integers,
/// altitude is in meters.
pub fn set_location(
    node_num: u32,
    latitude_i: i32,
    longitude_i: i32,
    altitude: i32,
) -> protobufs::ToRadio {
    let position = protobufs::Position {
        latitude_i: Some(latitude_i),
        longitude_i: Some(longitude_i),
        altitude: Some(altitude),
        ..Default::default()
    };

    application_packet(node_num, protobufs::PortNum::PositionApp, position.encode_to_vec())
}

pub fn factory_reset() -> protobufs::AdminMessage {
    admin(admin_message::PayloadVariant::FactoryResetDevice(1))
}

/// Embed an admin message in a packet addressed to `node_num`.
pub fn admin_packet(node_num: u32, message: &protobufs::AdminMessage) -> protobufs::ToRadio {
    application_packet(node_num, protobufs::PortNum::AdminApp, message.encode_to_vec())
}

/// Ask the radio to dump its identity, node database and configuration.
pub fn want_config() -> protobufs::ToRadio {
    protobufs::ToRadio {
        payload_variant: Some(to_radio::PayloadVariant::WantConfigId(RADIO_INFO_CONFIG_ID)),
    }
}

fn admin(variant: admin_message::PayloadVariant) -> protobufs::AdminMessage {
    protobufs::AdminMessage {
        payload_variant: Some(variant),
        ..Default::default()
    }
}

/// Packet to `node_num` on `port` that asks for both an ack and a reply.
fn application_packet(
    node_num: u32,
    port: protobufs::PortNum,
    payload: Vec<u8>,
) -> protobufs::ToRadio {
    let packet = protobufs::MeshPacket {
        to: node_num,
        want_ack: true,
        payload_variant: Some(mesh_packet::PayloadVariant::Decoded(protobufs::Data {
            portnum: port as i32,
            payload,
            want_response: true,
            ..Default::default()
        })),
        ..Default::default()
    };

    packet_message(packet)
}

fn packet_message(packet: protobufs::MeshPacket) -> protobufs::ToRadio {
    protobufs::ToRadio {
        payload_variant: Some(to_radio::PayloadVariant::Packet(packet)),
    }
}
