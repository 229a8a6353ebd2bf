//! Packet framing — one record of the decoded payload stream.
//!
//! # On-disk layout (all fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   payload_length  body bytes *excluding* the clock (LE i32)
//!    4      4   packet_type     one of the closed code set below (LE i32)
//!    8     4+N  payload_body    payload_length + 4 bytes; starts with the
//!                               f32 clock (seconds since battle start)
//! ```
//!
//! The clock is part of the body here even though the wire length excludes
//! it: field offsets in the layout table are absolute within the body, with
//! the clock at offset 0.  Types `entity_property` (0x07) and
//! `entity_method` (0x08) carry a subtype as an i32 at body offset 8.
//!
//! The type set is closed.  A code outside it aborts decoding — a sparse
//! field table can shrug off an unknown *subtype*, but an unknown type means
//! the framing itself can no longer be trusted.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// Byte width of the clock field at the start of every payload body.
pub const CLOCK_SIZE: usize = 4;

macro_rules! packet_types {
    ($($variant:ident = $code:literal, $name:literal;)*) => {
        /// Closed sum over every packet type code the format defines.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PacketType {
            $($variant,)*
        }

        impl PacketType {
            /// Resolve an on-wire type code.  `None` for anything outside
            /// the closed set.
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(PacketType::$variant),)*
                    _ => None,
                }
            }

            /// The on-wire type code.
            #[inline]
            pub fn code(self) -> i32 {
                match self {
                    $(PacketType::$variant => $code,)*
                }
            }

            /// The snake_case identifier used by the textual form.
            pub fn name(self) -> &'static str {
                match self {
                    $(PacketType::$variant => $name,)*
                }
            }

            /// Parse a textual-form identifier back into a type.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(PacketType::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

packet_types! {
    BasePlayerCreate        = 0x00, "base_player_create";
    CellPlayerCreate        = 0x01, "cell_player_create";
    EntityControl           = 0x02, "entity_control";
    EntityEnter             = 0x03, "entity_enter";
    EntityLeave             = 0x04, "entity_leave";
    EntityCreate            = 0x05, "entity_create";
    EntityProperties        = 0x06, "entity_properties";
    EntityProperty          = 0x07, "entity_property";
    EntityMethod            = 0x08, "entity_method";
    EntityMove              = 0x09, "entity_move";
    EntityMoveWithError     = 0x0A, "entity_move_with_error";
    SpaceData               = 0x0B, "space_data";
    SpaceGone               = 0x0C, "space_gone";
    StreamComplete          = 0x0D, "stream_complete";
    EntitiesReset           = 0x0E, "entities_reset";
    RestoreClient           = 0x0F, "restore_client";
    EnableEntitiesRejected  = 0x10, "enable_entities_rejected";
    ClientReady             = 0x11, "client_ready";
    SetArenaPeriod          = 0x12, "set_arena_period";
    SetArenaLength          = 0x13, "set_arena_length";
    ClientVersion           = 0x14, "client_version";
    UpdateCamera            = 0x15, "update_camera";
    UpdateGunMarker         = 0x16, "update_gun_marker";
    ChangeControlMode       = 0x17, "change_control_mode";
    UpdateTurretYaw         = 0x18, "update_turret_yaw";
    UpdateGunPitch          = 0x19, "update_gun_pitch";
    AmmoButtonPressed       = 0x1A, "ammo_button_pressed";
    UpdateFpsPingLag        = 0x1B, "update_fps_ping_lag";
    SetGunReloadTime        = 0x1C, "set_gun_reload_time";
    SetActiveConsumableSlot = 0x1D, "set_active_consumable_slot";
    SetPlayerVehicleId      = 0x1E, "set_player_vehicle_id";
    BattleChatMessage       = 0x1F, "battle_chat_message";
    NestedEntityProperty    = 0x20, "nested_entity_property";
    MinimapCellClicked      = 0x21, "minimap_cell_clicked";
    UpdateCamera2           = 0x22, "update_camera2";
    SetServerTime           = 0x23, "set_server_time";
    LockTarget              = 0x24, "lock_target";
    SetCruiseMode           = 0x25, "set_cruise_mode";
    UnknownLast             = 0x26, "unknown_last";
    Unknown39               = 39,   "unknown_39";
    Unknown40               = 40,   "unknown_40";
}

impl PacketType {
    /// Types that carry a subtype discriminant at body offset 8.
    #[inline]
    pub fn has_subtype(self) -> bool {
        matches!(self, PacketType::EntityProperty | PacketType::EntityMethod)
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("packet stream truncated mid-{0}")]
    Truncated(&'static str),
    #[error("unknown packet type {0:#04x}")]
    UnknownPacketType(i32),
    #[error("packet declares impossible payload length {0}")]
    BadLength(i64),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn truncated(e: io::Error, what: &'static str) -> PacketError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        PacketError::Truncated(what)
    } else {
        PacketError::Io(e)
    }
}

// ── Packet ───────────────────────────────────────────────────────────────────

/// One decoded packet: framing fields plus the raw body.
///
/// `clock` and `subtype` are convenience views of body bytes 0..4 and 8..12;
/// the body remains authoritative on write.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub ptype:   PacketType,
    pub subtype: Option<i32>,
    pub clock:   f32,
    pub body:    Vec<u8>,
}

/// Read one packet.
///
/// Returns `Ok(None)` at clean EOF — zero bytes available where the next
/// length field would start.  A partial length field, or EOF inside any
/// later fixed-size field, is `Truncated`.
pub fn read_packet<R: Read>(mut r: R) -> Result<Option<Packet>, PacketError> {
    // Distinguish clean EOF from a torn packet: pull the length field
    // byte-wise so a zero-byte read can surface as end-of-stream.
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = r.read(&mut len_buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    match filled {
        0 => return Ok(None),
        4 => {}
        _ => return Err(PacketError::Truncated("length field")),
    }

    let declared = i32::from_le_bytes(len_buf);
    if declared < 0 {
        return Err(PacketError::BadLength(declared as i64));
    }

    let code = r
        .read_i32::<LittleEndian>()
        .map_err(|e| truncated(e, "type field"))?;
    let ptype = PacketType::from_code(code).ok_or(PacketError::UnknownPacketType(code))?;

    let mut body = vec![0u8; declared as usize + CLOCK_SIZE];
    r.read_exact(&mut body).map_err(|e| truncated(e, "payload body"))?;

    let clock = f32::from_le_bytes(body[0..4].try_into().unwrap());
    let subtype = if ptype.has_subtype() {
        if body.len() < 12 {
            return Err(PacketError::Truncated("subtype field"));
        }
        Some(i32::from_le_bytes(body[8..12].try_into().unwrap()))
    } else {
        None
    };

    Ok(Some(Packet { ptype, subtype, clock, body }))
}

/// Write one packet: `body.len() - 4` as the wire length, the type code,
/// then the body verbatim.
pub fn write_packet<W: Write>(mut w: W, ptype: PacketType, body: &[u8]) -> Result<(), PacketError> {
    if body.len() < CLOCK_SIZE {
        return Err(PacketError::BadLength(body.len() as i64 - CLOCK_SIZE as i64));
    }
    let wire_len = i32::try_from(body.len() - CLOCK_SIZE)
        .map_err(|_| PacketError::BadLength((body.len() - CLOCK_SIZE) as i64))?;
    w.write_i32::<LittleEndian>(wire_len)?;
    w.write_i32::<LittleEndian>(ptype.code())?;
    w.write_all(body)?;
    Ok(())
}
