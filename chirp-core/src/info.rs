use serde::Serialize;

use crate::message::DecodedMessage;

/// Headline facts extracted from a radio info dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoSummary {
    pub responses: usize,
    pub my_node: String,
    pub device_id: String,
    pub reboot_count: u32,
    pub firmware: String,
    pub hw_model: String,
    pub role: String,
    pub nodes: usize,
    pub channels: usize,
    pub configs: usize,
    pub module_configs: usize,
}

impl InfoSummary {
    pub fn from_messages(messages: &[DecodedMessage]) -> Self {
        let mut summary = Self {
            responses: messages.len(),
            my_node: "-".to_string(),
            device_id: "-".to_string(),
            reboot_count: 0,
            firmware: "-".to_string(),
            hw_model: "-".to_string(),
            role: "-".to_string(),
            nodes: 0,
            channels: 0,
            configs: 0,
            module_configs: 0,
        };

        for message in messages {
            match message {
                DecodedMessage::MyInfo(info) => {
                    summary.my_node = format!("!{:08x}", info.my_node_num);
                    summary.reboot_count = info.reboot_count;
                    if !info.device_id.is_empty() {
                        summary.device_id = hex::encode(&info.device_id);
                    }
                }
                DecodedMessage::Metadata(metadata) => {
                    if !metadata.firmware_version.is_empty() {
                        summary.firmware = metadata.firmware_version.clone();
                    }
                    summary.hw_model = metadata.hw_model().as_str_name().to_string();
                    summary.role = metadata.role().as_str_name().to_string();
                }
                DecodedMessage::NodeInfo(_) => summary.nodes += 1,
                DecodedMessage::Channel(_) => summary.channels += 1,
                DecodedMessage::Config(_) => summary.configs += 1,
                DecodedMessage::ModuleConfig(_) => summary.module_configs += 1,
                _ => {}
            }
        }

        summary
    }

    /// Field/value pairs in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("responses", self.responses.to_string()),
            ("my_node", self.my_node.clone()),
            ("device_id", self.device_id.clone()),
            ("reboot_count", self.reboot_count.to_string()),
            ("firmware", self.firmware.clone()),
            ("hw_model", self.hw_model.clone()),
            ("role", self.role.clone()),
            ("nodes", self.nodes.to_string()),
            ("channels", self.channels.to_string()),
            ("configs", self.configs.to_string()),
            ("module_configs", self.module_configs.to_string()),
        ]
    }
}
