//! Error type shared by the parsers, the SCR tracker and the system parser.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PsError {
    /// Buffer shorter than the fixed part of the header
    #[error("short buffer: need {needed} bytes, have {available}")]
    ShortBuffer { needed: usize, available: usize },

    #[error("pack header layout not recognized (marker 0x{0:02X})")]
    BadPackHeader(u8),

    #[error("malformed system header: {0}")]
    BadSystemHeader(String),

    #[error("malformed PES header for stream 0x{stream_id:02X}: {reason}")]
    BadPesHeader { stream_id: u8, reason: String },

    /// No mux rate seen yet, byte/time conversion impossible
    #[error("multiplex rate unknown")]
    UnknownRate,
}

pub type PsResult<T> = Result<T, PsError>;

impl PsError {
    pub(crate) fn short(needed: usize, available: usize) -> Self {
        PsError::ShortBuffer { needed, available }
    }
}
