use thiserror::Error;

pub type Result<T> = std::result::Result<T, DemoError>;
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Errors local to a single record.
///
/// These never escape the sub-message decoder: a record that fails to decode is reported as
/// [`crate::SarData::Invalid`] and the rest of the file is still processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer too small for {what} at offset {offset} (need {need} bytes, have {have})")]
    Truncated {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("sar data `{tag:#04x}` has length {declared}, expected {expected}")]
    LengthMismatch {
        tag: u8,
        declared: usize,
        expected: &'static str,
    },

    #[error("unknown sar data type `{tag:#04x}`")]
    UnknownTag { tag: u8 },

    #[error("sar data `{tag:#04x}` has {bits_left} unread bits after decoding")]
    Overlong { tag: u8, bits_left: usize },
}

/// Whole-file failures.
///
/// Anything in here means the input is not a demo we can make sense of, and no partial result is
/// returned.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("invalid demo header magic, expected `HL2DEMO\\0`, found `{magic:02X?}`")]
    InvalidMagic { magic: [u8; 8] },

    #[error("demo is truncated while reading {context}: {source}")]
    Truncated {
        context: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error("offset {offset}: unknown demo message type `{message_type}` (demo protocol {protocol})")]
    UnknownMessageType {
        message_type: u8,
        protocol: i32,
        offset: u64,
    },

    #[error("offset {offset}: {what} has a negative size ({size})")]
    NegativeSize {
        what: &'static str,
        size: i32,
        offset: u64,
    },

    #[error("reached end of demo without a stop message")]
    MissingStopMessage,

    #[error("demo is {size} bytes, which exceeds the configured limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

pub(crate) trait DecodeResultExt<T> {
    /// Promote a record-level decode failure to a whole-file failure.
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> DecodeResultExt<T> for DecodeResult<T> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|source| DemoError::Truncated { context, source })
    }
}
