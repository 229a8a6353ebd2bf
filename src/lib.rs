//! # blitzkit — `.wotreplay` container codec and packet toolkit
//!
//! Format guarantees:
//! - All numeric fields are little-endian; metadata JSON is ASCII, chat
//!   messages are UTF-8
//! - Outer header mismatches are warnings, never errors; replays from
//!   unknown client builds stay readable
//! - The payload region is a zlib stream encrypted with fixed-key Blowfish
//!   in a plaintext-chained XOR mode (not CBC: both codec directions keep
//!   their chain state on plaintext blocks)
//! - The packet type set is closed; an unknown type code aborts decoding
//! - The `(packet_type, subtype)` field table is sparse: unlisted
//!   combinations expose only the clock, and fields are independent
//!   overlays rather than a packed struct
//! - Unpack → pack of unedited artifacts reproduces the container byte for
//!   byte; disassemble → assemble does the same for the packet stream

pub mod container;
pub mod crypto;
pub mod fields;
pub mod packet;
pub mod payload;
pub mod text;

// Flat re-exports for the most common types.
pub use container::{ContainerError, Replay, INNER_MAGIC, OUTER_MAGIC};
pub use fields::{packet_fields, serializer_for, FieldError, FieldSpec, Serializer, Value};
pub use packet::{read_packet, write_packet, Packet, PacketError, PacketType};
pub use payload::PayloadError;
pub use text::{assemble, disassemble, TextError};
