//! Error types for discmux-mpls.

use std::io;
use thiserror::Error;

/// Result type for discmux-mpls operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for discmux-mpls operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File does not start with the `MPLS` magic.
    #[error("Not an MPLS file (magic {0:?})")]
    InvalidMagic([u8; 4]),

    /// Version header other than 0100/0200/0300.
    #[error("Unsupported MPLS version: {0}")]
    UnsupportedVersion(String),

    /// Read past the end of the playlist data.
    #[error("Unexpected end of data at offset {offset}: need {need} bytes, have {have}")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        have: usize,
    },

    /// Stream coding type not defined for Blu-ray.
    #[error("Unknown stream coding type: {0:#04x}")]
    UnknownCodec(u8),

    /// Structurally invalid play item, stream entry or mark.
    #[error("Invalid playlist: {0}")]
    Invalid(String),
}

impl Error {
    /// Create an invalid playlist error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
