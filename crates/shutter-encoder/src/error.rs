//! Error types for the encoder module.

use thiserror::Error;

/// Errors that can occur while encoding or multiplexing.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// A sample was written before every track requested a start.
    #[error("Write to track {track} before the container was opened")]
    WriteBeforeOpen { track: usize },

    /// More tracks requested a start than the controller was built for.
    #[error("Container already open")]
    AlreadyOpen,

    /// The track index was never handed out.
    #[error("Unknown track: {0}")]
    UnknownTrack(usize),

    /// The container sink failed.
    #[error("Sink error: {0}")]
    Sink(#[from] std::io::Error),

    /// The container could not be finalized.
    #[error("Finalize failed: {0}")]
    Finalize(String),

    /// A track encoder rejected its input.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The engine was used in the wrong order.
    #[error("Encoder not started")]
    NotStarted,
}
