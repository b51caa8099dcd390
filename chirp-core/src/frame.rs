//! Serial framing used by Meshtastic devices.
//!
//! Wire format:
//! ```text
//! ┌──────────┬──────────┬───────────────┬──────────────────┐
//! │ 0x94     │ 0xC3     │ Length (2B BE)│ Payload          │
//! └──────────┴──────────┴───────────────┴──────────────────┘
//! ```
//! The radio drops frames whose payload exceeds [`MAX_PAYLOAD_LEN`], and the
//! decoder does the same on the way in. Anything that does not line up with
//! a frame boundary is discarded while scanning for the next preamble.

use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{RadioError, Result};
use crate::message::DecodedMessage;
use crate::stream::{ByteStream, ReadInterruption};

pub const PREAMBLE: [u8; 2] = [0x94, 0xC3];

/// Preamble plus the 16-bit length field.
pub const HEADER_LEN: usize = 4;

pub const MAX_PAYLOAD_LEN: usize = 512;

/// Identical consecutive bytes tolerated before a header is seen. A port
/// streaming one constant value is treated as an idle line.
pub const STUCK_BYTE_LIMIT: usize = 20;

const READ_CHUNK: usize = 64;

/// Wrap `payload` in a frame header.
///
/// The 512-byte cap is enforced by the receiving radio, not here; only a
/// payload that cannot be described by the length field is rejected.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(payload.len())
        .map_err(|_| RadioError::PayloadTooLarge { len: payload.len() })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&PREAMBLE);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Result of feeding one byte to a [`FrameDecoder`].
#[derive(Debug, PartialEq, Eq)]
pub enum Feed<'a> {
    /// Need more bytes.
    Pending,
    /// A complete payload. Valid until the next call to `feed`.
    Frame(&'a [u8]),
    /// The line keeps repeating one byte value outside of any frame.
    Stalled,
}

/// Incremental frame reassembler.
///
/// The accumulation buffer is reused across frames and across reads, so a
/// frame split by a read deadline is completed by the next read. Bytes read
/// from the stream but not yet fed when a read ends early stay queued for
/// the next read.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    unread: VecDeque<u8>,
    emitted: bool,
    last_byte: Option<u8>,
    repeats: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(HEADER_LEN + MAX_PAYLOAD_LEN),
            unread: VecDeque::new(),
            emitted: false,
            last_byte: None,
            repeats: 0,
        }
    }

    /// Bytes held towards the next frame.
    pub fn buffered(&self) -> usize {
        if self.emitted { 0 } else { self.buf.len() }
    }

    /// Bytes taken from the stream that have not been fed yet.
    pub fn unread(&self) -> usize {
        self.unread.len()
    }

    /// Forget the repeated-byte history. Partial frames are kept.
    pub fn reset_line_watch(&mut self) {
        self.last_byte = None;
        self.repeats = 0;
    }

    pub fn feed(&mut self, byte: u8) -> Feed<'_> {
        if self.emitted {
            self.buf.clear();
            self.emitted = false;
        }

        if self.last_byte == Some(byte) {
            self.repeats += 1;
        } else {
            self.last_byte = Some(byte);
            self.repeats = 0;
        }

        if self.repeats > STUCK_BYTE_LIMIT && self.buf.len() < HEADER_LEN {
            return Feed::Stalled;
        }

        self.buf.push(byte);

        match self.buf.len() {
            1 => {
                if byte != PREAMBLE[0] {
                    self.buf.clear();
                }
            }
            2 => {
                if byte != PREAMBLE[1] {
                    trace!("Bad second preamble byte {byte:#04x}, rescanning");
                    self.buf.clear();
                }
            }
            3 => {}
            len => {
                let declared = usize::from(u16::from_be_bytes([self.buf[2], self.buf[3]]));
                if len == HEADER_LEN && declared > MAX_PAYLOAD_LEN {
                    debug!("Dropping frame with oversized length {declared}");
                    self.buf.clear();
                    return Feed::Pending;
                }
                if len == HEADER_LEN + declared {
                    self.emitted = true;
                    return Feed::Frame(&self.buf[HEADER_LEN..]);
                }
            }
        }

        Feed::Pending
    }

    /// Pull bytes from `stream` until it reports end-of-stream or a read
    /// deadline, the line stalls, or `cutoff` passes, decoding every frame
    /// completed along the way.
    ///
    /// Only transport failures and undecodable payloads are errors.
    pub fn read_messages<S: ByteStream + ?Sized>(
        &mut self,
        stream: &mut S,
        cutoff: Option<Instant>,
    ) -> Result<Vec<DecodedMessage>> {
        self.reset_line_watch();

        let mut chunk = [0u8; READ_CHUNK];
        let mut messages = Vec::new();

        loop {
            if self.unread.is_empty() {
                let n = match stream.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => match ReadInterruption::classify(&e) {
                        ReadInterruption::EndOfStream | ReadInterruption::DeadlineExceeded => break,
                        ReadInterruption::Retry => continue,
                        ReadInterruption::Failure => return Err(e.into()),
                    },
                };
                self.unread.extend(&chunk[..n]);
            }

            while let Some(byte) = self.unread.pop_front() {
                match self.feed(byte) {
                    Feed::Pending => {}
                    Feed::Frame(payload) => messages.push(DecodedMessage::decode(payload)?),
                    Feed::Stalled => {
                        warn!("Line repeats {byte:#04x}, assuming the radio is idle");
                        return Ok(messages);
                    }
                }
            }

            if cutoff.is_some_and(|cutoff| Instant::now() >= cutoff) {
                debug!("Read cutoff reached with {count} message(s)", count = messages.len());
                break;
            }
        }

        Ok(messages)
    }
}
