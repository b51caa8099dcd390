//! One-line renderings of radio traffic for streaming output.

use chrono::{DateTime, SecondsFormat};
use meshtastic::Message;
use meshtastic::protobufs::{self, config, module_config, telemetry};
use serde::Serialize;
use std::fmt;
use strum::Display;

use crate::message::{DecodedMessage, MeshPacket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StreamCategory {
    Event,
    Packet,
    Telemetry,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamLine {
    pub label: &'static str,
    pub message: String,
    pub category: StreamCategory,
}

impl StreamLine {
    fn event(message: String) -> Self {
        Self {
            label: "EVT",
            message,
            category: StreamCategory::Event,
        }
    }

    fn telemetry(message: String) -> Self {
        Self {
            label: "TEL",
            message,
            category: StreamCategory::Telemetry,
        }
    }
}

impl fmt::Display for StreamLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{label}] {message}", label = self.label, message = self.message)
    }
}

pub fn render(message: &DecodedMessage) -> Vec<StreamLine> {
    let line = match message {
        DecodedMessage::Packet(packet) => return render_packet(packet),
        DecodedMessage::LogRecord(record) => format!(
            "log level={level} source={source} msg={msg:?}",
            level = record.level().as_str_name(),
            source = record.source,
            msg = record.message,
        ),
        DecodedMessage::QueueStatus(status) => format!(
            "queue res={res} free={free}/{maxlen} mesh_packet_id={id}",
            res = status.res,
            free = status.free,
            maxlen = status.maxlen,
            id = status.mesh_packet_id,
        ),
        DecodedMessage::Rebooted(rebooted) => format!("rebooted={rebooted}"),
        DecodedMessage::ConfigComplete(id) => format!("config_complete_id={id}"),
        DecodedMessage::MyInfo(info) => format!("my_info node_num=!{:08x}", info.my_node_num),
        DecodedMessage::NodeInfo(node) => format!(
            "node_info node_num=!{num:08x} user={name:?}",
            num = node.num,
            name = node.user.as_ref().map(|u| u.long_name.as_str()).unwrap_or(""),
        ),
        DecodedMessage::Metadata(metadata) => format!(
            "metadata fw={fw:?} state_ver={state_ver} hw={hw} role={role} wifi={wifi} bt={bt} eth={eth}",
            fw = metadata.firmware_version,
            state_ver = metadata.device_state_version,
            hw = metadata.hw_model().as_str_name(),
            role = metadata.role().as_str_name(),
            wifi = metadata.has_wifi,
            bt = metadata.has_bluetooth,
            eth = metadata.has_ethernet,
        ),
        DecodedMessage::Channel(channel) => {
            let settings = channel.settings.clone().unwrap_or_default();
            format!(
                "channel index={index} role={role} name={name:?} id={id} uplink={uplink} downlink={downlink}",
                index = channel.index,
                role = channel.role().as_str_name(),
                name = settings.name,
                id = settings.id,
                uplink = settings.uplink_enabled,
                downlink = settings.downlink_enabled,
            )
        }
        DecodedMessage::Config(config) => format!(
            "config section={section}",
            section = config_section_name(config.payload_variant.as_ref()),
        ),
        DecodedMessage::ModuleConfig(config) => format!(
            "module_config section={section}",
            section = module_config_section_name(config.payload_variant.as_ref()),
        ),
        DecodedMessage::FileInfo(info) => format!(
            "file_info name={name:?} size_bytes={size}",
            name = info.file_name,
            size = info.size_bytes,
        ),
        DecodedMessage::Other(from_radio) => format!(
            "variant={variant}",
            variant = variant_name(from_radio.payload_variant.as_ref()),
        ),
    };

    vec![StreamLine::event(line)]
}

pub fn render_packet(packet: &MeshPacket) -> Vec<StreamLine> {
    let (port, payload_len) = match &packet.payload {
        Some(payload) => (payload.port.as_str_name(), payload.bytes.len()),
        None => ("UNKNOWN", 0),
    };

    let mut lines = vec![StreamLine {
        label: "PKT",
        message: format!(
            "from=!{from:08x} to=!{to:08x} ch={ch} id={id} hop={hop} rssi={rssi}dBm snr={snr:.2} rx_time={rx_time} port={port} bytes={payload_len}",
            from = packet.from,
            to = packet.to,
            ch = packet.channel,
            id = packet.id,
            hop = packet.hop_limit,
            rssi = packet.rx_rssi,
            snr = packet.rx_snr,
            rx_time = format_unix_seconds(packet.rx_time),
        ),
        category: StreamCategory::Packet,
    }];

    let Some(payload) = &packet.payload else {
        return lines;
    };

    match payload.port {
        protobufs::PortNum::TextMessageApp => {
            let text = String::from_utf8_lossy(&payload.bytes);
            lines.push(StreamLine {
                label: "MSG",
                message: format!("text={text:?}", text = text.trim()),
                category: StreamCategory::Message,
            });
        }
        protobufs::PortNum::TelemetryApp => lines.push(render_telemetry(&payload.bytes)),
        _ => {}
    }

    lines
}

fn render_telemetry(payload: &[u8]) -> StreamLine {
    let telemetry = match protobufs::Telemetry::decode(payload) {
        Ok(telemetry) => telemetry,
        Err(e) => return StreamLine::telemetry(format!("decode_error={e}")),
    };

    let time = format_unix_seconds(telemetry.time);

    let message = match &telemetry.variant {
        Some(telemetry::Variant::DeviceMetrics(m)) => format!(
            "type=device time={time} batt={batt}% volt={volt:.2}V ch_util={ch_util:.2}% air_tx={air_tx:.2}% uptime={uptime}s",
            batt = m.battery_level.unwrap_or_default(),
            volt = m.voltage.unwrap_or_default(),
            ch_util = m.channel_utilization.unwrap_or_default(),
            air_tx = m.air_util_tx.unwrap_or_default(),
            uptime = m.uptime_seconds.unwrap_or_default(),
        ),
        Some(telemetry::Variant::LocalStats(s)) => format!(
            "type=local time={time} uptime={uptime}s nodes={online}/{total} pkts_tx={tx} pkts_rx={rx} bad_rx={bad} ch_util={ch_util:.2}% air_tx={air_tx:.2}%",
            uptime = s.uptime_seconds,
            online = s.num_online_nodes,
            total = s.num_total_nodes,
            tx = s.num_packets_tx,
            rx = s.num_packets_rx,
            bad = s.num_packets_rx_bad,
            ch_util = s.channel_utilization,
            air_tx = s.air_util_tx,
        ),
        Some(telemetry::Variant::EnvironmentMetrics(m)) => format!(
            "type=env time={time} temp={temp:.2}C hum={hum:.2}% pressure={pressure:.2}hPa",
            temp = m.temperature.unwrap_or_default(),
            hum = m.relative_humidity.unwrap_or_default(),
            pressure = m.barometric_pressure.unwrap_or_default(),
        ),
        other => format!(
            "type=other time={time} variant={variant}",
            variant = variant_name(other.as_ref()),
        ),
    };

    StreamLine::telemetry(message)
}

/// RFC 3339 UTC timestamp, or `-` for 0.
pub fn format_unix_seconds(ts: u32) -> String {
    if ts == 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp(i64::from(ts), 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}

fn config_section_name(variant: Option<&config::PayloadVariant>) -> &'static str {
    use config::PayloadVariant as V;

    match variant {
        Some(V::Device(_)) => "device",
        Some(V::Position(_)) => "position",
        Some(V::Power(_)) => "power",
        Some(V::Network(_)) => "network",
        Some(V::Display(_)) => "display",
        Some(V::Lora(_)) => "lora",
        Some(V::Bluetooth(_)) => "bluetooth",
        Some(V::Security(_)) => "security",
        Some(V::Sessionkey(_)) => "sessionkey",
        Some(V::DeviceUi(_)) => "device_ui",
        None => "unknown",
    }
}

fn module_config_section_name(variant: Option<&module_config::PayloadVariant>) -> &'static str {
    use module_config::PayloadVariant as V;

    #[allow(unreachable_patterns)]
    match variant {
        Some(V::Mqtt(_)) => "mqtt",
        Some(V::Serial(_)) => "serial",
        Some(V::ExternalNotification(_)) => "external_notification",
        Some(V::StoreForward(_)) => "store_forward",
        Some(V::RangeTest(_)) => "range_test",
        Some(V::Telemetry(_)) => "telemetry",
        Some(V::CannedMessage(_)) => "canned_message",
        Some(V::Audio(_)) => "audio",
        Some(V::RemoteHardware(_)) => "remote_hardware",
        Some(V::NeighborInfo(_)) => "neighbor_info",
        Some(V::AmbientLighting(_)) => "ambient_lighting",
        Some(V::DetectionSensor(_)) => "detection_sensor",
        Some(V::Paxcounter(_)) => "paxcounter",
        // Sections added by newer firmware.
        _ => "unknown",
    }
}

/// snake_case name of a oneof variant with no dedicated rendering, taken
/// from its `Debug` form (`DeviceUi(..)` becomes `device_ui`).
fn variant_name<T: fmt::Debug>(variant: Option<&T>) -> String {
    let Some(variant) = variant else {
        return "unknown".to_string();
    };

    let debug = format!("{variant:?}");
    let ident = debug.split(['(', ' ', '{']).next().unwrap_or_default();

    let mut name = String::with_capacity(ident.len() + 4);
    for (i, c) in ident.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                name.push('_');
            }
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }

    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}
