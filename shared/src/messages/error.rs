use thiserror::Error;

/// Errors that can occur while encoding or decoding peer messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Message could not be serialized
    #[error("Failed to encode '{command}' message: {reason}")]
    Encode {
        command: &'static str,
        reason: String,
    },

    /// Frame was not a valid tagged message (SECURITY: treat the peer as suspect)
    #[error("Failed to decode frame of {frame_size} bytes: {reason}")]
    Decode { frame_size: usize, reason: String },

    /// Frame exceeded the maximum accepted size
    #[error("Frame of {frame_size} bytes exceeds the limit of {limit} bytes")]
    FrameTooLarge { frame_size: usize, limit: usize },
}
