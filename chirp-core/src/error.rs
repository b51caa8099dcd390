use thiserror::Error;

/// Errors produced by the radio engine.
#[derive(Debug, Error)]
pub enum RadioError {
    /// The byte stream failed with something other than end-of-stream or a
    /// read deadline.
    #[error(transparent)]
    Transport(#[from] std::io::Error),

    /// A frame arrived intact but its payload is not a valid radio message.
    #[error("failed to decode radio message")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Every poll attempt came back empty.
    #[error("failed to get radio info: no response after {attempts} attempts")]
    NoResponse { attempts: u32 },

    /// The radio answered but never reported its own node number.
    #[error("failed to determine node number")]
    IdentityUnknown,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("radio session is closed")]
    NotConnected,

    /// The payload does not fit the 16-bit length field of a frame.
    #[error("payload of {len} bytes cannot be framed")]
    PayloadTooLarge { len: usize },
}

impl RadioError {
    /// True when the failure was caused by caller input rather than the radio.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Input rejected before any I/O is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message too large: {len} bytes (max {max})")]
    MessageTooLarge { len: usize, max: usize },

    #[error("name too short: {len} bytes (need at least 3)")]
    NameTooShort { len: usize },

    #[error("invalid modem mode {mode:?}: must be one of {valid}")]
    InvalidModemMode { mode: String, valid: String },
}

pub type Result<T> = std::result::Result<T, RadioError>;
