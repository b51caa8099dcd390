//! Protocol engine for talking to a Meshtastic radio over a serial port.
//!
//! The engine frames and deframes the radio's binary stream, builds the
//! commands it understands, and runs the request/response cycles needed to
//! read its state. Everything here is synchronous; callers that need to stay
//! responsive run it on a worker thread.

pub mod command;
pub mod error;
pub mod events;
pub mod frame;
pub mod info;
pub mod message;
pub mod session;
pub mod stream;

pub use error::{RadioError, Result, ValidationError};
pub use info::InfoSummary;
pub use message::DecodedMessage;
pub use session::{RadioSession, SessionConfig};
pub use stream::{ByteStream, SerialStream};

// Re-export meshtastic types for convenience
pub use meshtastic::{Message, protobufs};
