//! Protocol layer: marker-delimited binary frames
//!
//! Prinsip desain:
//! - Two directions, each with its own marker alphabet
//! - No length prefix: frame boundaries are found by scanning for markers
//! - Decoding borrows the input and reports how much of it was consumed

mod encoder;
mod message;

pub use encoder::Wire;
pub use message::{
    anonymous_entry, client_markers, server_markers, ClientMessage, ErrorCode, ServerMessage,
    ANONYMOUS_NAME, MIN_FRAME_CAPACITY,
};
