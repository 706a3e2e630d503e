use log::debug;

use crate::messages::{error::MessageError, peer_message::PeerMessage};

/// Largest frame accepted from a peer.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Encodes a message as a tagged JSON object.
pub fn encode(message: &PeerMessage) -> Result<Box<[u8]>, MessageError> {
    serde_json::to_vec(message)
        .map(Vec::into_boxed_slice)
        .map_err(|err| MessageError::Encode {
            command: message.command(),
            reason: err.to_string(),
        })
}

pub fn decode(frame: &[u8]) -> Result<PeerMessage, MessageError> {
    if frame.len() > MAX_FRAME_BYTES {
        return Err(MessageError::FrameTooLarge {
            frame_size: frame.len(),
            limit: MAX_FRAME_BYTES,
        });
    }
    let message: PeerMessage =
        serde_json::from_slice(frame).map_err(|err| MessageError::Decode {
            frame_size: frame.len(),
            reason: err.to_string(),
        })?;
    debug!("decoded '{}' frame ({} bytes)", message.command(), frame.len());
    Ok(message)
}
