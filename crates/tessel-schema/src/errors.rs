use thiserror::Error;

/// Error type for decoding and verifying size-prefixed binary artifacts.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SchemaError {
    /// Error returned when a buffer is too short to hold the size prefix, identifier, and digest.
    #[error("buffer of {length} byte(s) is too short to hold a size-prefixed binary")]
    TruncatedBuffer { length: usize },

    /// Error returned when a payload is too large for its framed length to fit in the `u32` size prefix.
    #[error("payload of {length} byte(s) is too large to be framed with a 32-bit size prefix")]
    PayloadTooLarge { length: usize },

    /// Error returned when the size prefix does not match the number of bytes that follow it.
    #[error("size prefix declares {declared} byte(s) but {actual} byte(s) follow it")]
    LengthMismatch { declared: usize, actual: usize },

    /// Error returned when the file identifier is not the one written by
    /// [`finish_size_prefixed`](crate::finish_size_prefixed).
    #[error("unknown binary identifier {found:?}")]
    UnknownIdentifier { found: [u8; 4] },

    /// Error returned when the payload does not hash to the digest stored in the header.
    #[error("payload digest does not match the digest stored in the binary header")]
    DigestMismatch,

    /// Error returned when the payload cannot be decoded as a [`Binary`](crate::Binary).
    #[error("failed to decode binary payload: {message}")]
    Decode { message: String },

    /// Error returned when a required field of a record is not set.
    #[error("required field '{field}' of '{record}' is missing")]
    MissingField { record: &'static str, field: &'static str },

    /// Error returned when a handle does not index into its object table.
    #[error("handle {handle} is out of bounds for the '{table}' table, which holds {length} record(s)")]
    InvalidHandle { table: &'static str, handle: u32, length: usize },

    /// Error returned when an enumeration field holds a value that has no corresponding variant.
    #[error("value {value} is not a valid '{enumeration}'")]
    UnknownEnumValue { enumeration: &'static str, value: i32 },
}

impl From<prost::DecodeError> for SchemaError {
    fn from(error: prost::DecodeError) -> Self {
        Self::Decode { message: error.to_string() }
    }
}
