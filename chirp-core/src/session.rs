use meshtastic::Message;
use meshtastic::protobufs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::command::{self, MAX_PACKET_ID, ModemMode};
use crate::error::{RadioError, Result};
use crate::frame::{FrameDecoder, encode_frame};
use crate::message::DecodedMessage;
use crate::stream::{ByteStream, SerialStream};

/// Timing of the request/poll cycle used to fetch radio info.
///
/// Radio info is fetched by sending the config request `wake_send_attempts`
/// times (pausing `wake_send_interval` after each), then reading up to
/// `poll_attempts` times with `poll_interval` between empty reads.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub wake_send_attempts: u32,
    pub wake_send_interval: Duration,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    /// OS-level timeout for each read when a bounded read is requested.
    pub read_poll_timeout: Duration,
    /// Wall-clock limit on a single bounded read.
    pub read_cutoff: Duration,
    /// Fixed seed for packet ids. Drawn from the OS when `None`.
    pub packet_id_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wake_send_attempts: 1,
            wake_send_interval: Duration::from_millis(300),
            poll_attempts: 5,
            poll_interval: Duration::from_secs(1),
            read_poll_timeout: Duration::from_millis(200),
            read_cutoff: Duration::from_secs(2),
            packet_id_seed: None,
        }
    }
}

/// A connection to one radio.
///
/// The session owns its stream and closes it once, either through
/// [`RadioSession::close`] or on drop. All operations block the calling
/// thread.
pub struct RadioSession<S: ByteStream = SerialStream> {
    stream: Option<S>,
    decoder: FrameDecoder,
    node_num: u32,
    rng: StdRng,
    config: SessionConfig,
}

impl RadioSession<SerialStream> {
    /// Open the serial port at `address` without querying the radio.
    pub fn connect(address: &str) -> Result<Self> {
        let stream = SerialStream::open(address)?;
        Ok(Self::new(stream))
    }

    /// Open the serial port at `address` and learn the radio's node number.
    pub fn open(address: &str) -> Result<Self> {
        let mut session = Self::connect(address)?;
        if let Err(e) = session.init() {
            if let Err(close_err) = session.close() {
                warn!("Failed to close {address} after init error: {close_err}");
            }
            return Err(e);
        }
        Ok(session)
    }
}

impl<S: ByteStream> RadioSession<S> {
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, SessionConfig::default())
    }

    pub fn with_config(stream: S, config: SessionConfig) -> Self {
        let rng = match config.packet_id_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            stream: Some(stream),
            decoder: FrameDecoder::new(),
            node_num: 0,
            rng,
            config,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// The radio's own node number, 0 until [`RadioSession::init`] succeeds.
    pub fn node_num(&self) -> u32 {
        self.node_num
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Fetch radio info and cache the node number from the first identity
    /// message that carries one.
    pub fn init(&mut self) -> Result<u32> {
        let messages = self.get_radio_info()?;

        let node_num = messages
            .iter()
            .find_map(DecodedMessage::my_node_num)
            .ok_or(RadioError::IdentityUnknown)?;

        info!("Connected to node !{node_num:08x}");
        self.node_num = node_num;
        Ok(node_num)
    }

    /// Frame `payload` and write it to the radio.
    pub fn send_packet(&mut self, payload: &[u8]) -> Result<()> {
        let frame = encode_frame(payload)?;
        let stream = self.stream.as_mut().ok_or(RadioError::NotConnected)?;

        let mut remaining = frame.as_slice();
        while !remaining.is_empty() {
            let written = stream.write(remaining)?;
            if written == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            remaining = &remaining[written..];
        }

        debug!("Wrote {len} bytes", len = frame.len());
        Ok(())
    }

    /// Read whatever the radio has sent.
    ///
    /// With `use_timeout` each read is bounded by
    /// [`SessionConfig::read_poll_timeout`] and the whole call by
    /// [`SessionConfig::read_cutoff`]. An idle line yields an empty list.
    pub fn read_response(&mut self, use_timeout: bool) -> Result<Vec<DecodedMessage>> {
        let stream = self.stream.as_mut().ok_or(RadioError::NotConnected)?;

        let cutoff = if use_timeout {
            stream.set_read_timeout(self.config.read_poll_timeout)?;
            Some(Instant::now() + self.config.read_cutoff)
        } else {
            None
        };

        self.decoder.read_messages(stream, cutoff)
    }

    /// Request the radio's identity, node database and configuration, and
    /// return every message of the first non-empty poll.
    pub fn get_radio_info(&mut self) -> Result<Vec<DecodedMessage>> {
        let request = command::want_config().encode_to_vec();

        for _ in 0..self.config.wake_send_attempts {
            self.send_packet(&request)?;
            std::thread::sleep(self.config.wake_send_interval);
        }

        let attempts = self.config.poll_attempts;
        for attempt in 1..=attempts {
            let messages = self.read_response(true)?;
            if !messages.is_empty() {
                debug!(
                    "Radio info poll {attempt}/{attempts} returned {count} message(s)",
                    count = messages.len()
                );
                return Ok(messages);
            }

            debug!("Radio info poll {attempt}/{attempts} was empty");
            if attempt < attempts {
                std::thread::sleep(self.config.poll_interval);
            }
        }

        Err(RadioError::NoResponse { attempts })
    }

    /// Send `message` to `destination` (0 broadcasts) on `channel`.
    pub fn send_text(&mut self, message: &str, destination: u32, channel: u32) -> Result<()> {
        let packet_id = self.rng.gen_range(1..=MAX_PACKET_ID);
        let to_radio = command::text_message(message, destination, channel, packet_id)?;
        debug!("Sending text packet {packet_id} to {destination:#010x} on channel {channel}");
        self.send_message(&to_radio)
    }

    /// Set the long name to `name` and the short name to its first three bytes.
    pub fn set_owner(&mut self, name: &str) -> Result<()> {
        let admin = command::set_owner(name)?;
        self.send_admin(&admin)
    }

    /// Switch the LoRa modem preset. `mode_code` is one of
    /// [`ModemMode::valid_codes`].
    pub fn set_modem_mode(&mut self, mode_code: &str) -> Result<()> {
        let mode = ModemMode::parse(mode_code)?;
        self.send_admin(&command::set_modem_preset(mode))
    }

    pub fn set_location(&mut self, latitude_i: i32, longitude_i: i32, altitude: i32) -> Result<()> {
        self.warn_if_unidentified();
        let to_radio = command::set_location(self.node_num, latitude_i, longitude_i, altitude);
        self.send_message(&to_radio)
    }

    pub fn factory_reset(&mut self) -> Result<()> {
        self.send_admin(&command::factory_reset())
    }

    /// Close the stream. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(mut stream) => {
                stream.close()?;
                debug!("Radio session closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn send_admin(&mut self, admin: &protobufs::AdminMessage) -> Result<()> {
        self.warn_if_unidentified();
        let to_radio = command::admin_packet(self.node_num, admin);
        self.send_message(&to_radio)
    }

    fn send_message(&mut self, to_radio: &protobufs::ToRadio) -> Result<()> {
        self.send_packet(&to_radio.encode_to_vec())
    }

    fn warn_if_unidentified(&self) {
        if self.node_num == 0 {
            warn!("Node number unknown, addressing the packet to node 0");
        }
    }
}

impl<S: ByteStream> Drop for RadioSession<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close radio session: {e}");
        }
    }
}
