//! Error types for pktstack

use thiserror::Error;

/// Result type alias for pktstack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pktstack
#[derive(Error, Debug)]
pub enum Error {
    /// The reader was asked for more bytes than remain in the buffer
    #[error("out of data: needed {needed} byte(s), {available} remaining")]
    OutOfData { needed: usize, available: usize },

    /// A field value falls outside its closed enumeration
    #[error("malformed field '{field}': unrecognized value {value:#x}")]
    MalformedField { field: &'static str, value: u32 },

    /// Packet construction error
    #[error("packet construction error: {0}")]
    Construction(String),
}

impl Error {
    /// Create a malformed field error
    pub fn malformed(field: &'static str, value: u32) -> Self {
        Error::MalformedField { field, value }
    }

    /// Create a construction error with a custom message
    pub fn construction<S: Into<String>>(msg: S) -> Self {
        Error::Construction(msg.into())
    }
}
