//! Frame-level protocol: wire format, frame type and frame reader.

pub mod frame;
pub mod reader;
pub mod wire;

pub use frame::Frame;
pub use reader::FrameReader;
pub use wire::{
    encode_frame, FrameKind, Header, HEADER_SIZE, MAX_PAYLOAD_SIZE, PING_FRAME, PONG_FRAME,
};
