pub mod codec;
pub mod error;
pub mod peer_message;
