//! Field serializers and the `(packet_type, subtype)` layout table.
//!
//! # Identity rules
//! A field is a named overlay at a fixed byte offset within a packet body.
//! Overlays are independent of each other: the table may list them in
//! non-monotonic offset order and two fields may sit closer together than
//! their widths suggest (`entity_method` subtype 0x01 puts `health` at 16
//! *before* `source` at 18).  Writers must never treat the list as a packed
//! struct.
//!
//! The table is a closed, static lookup — no registration, no runtime
//! extension.  Every packet type starts with the implicit `clock` field at
//! offset 0; combinations the table does not know expose only the clock.
//!
//! # Serializers
//! Six wire forms, expressed as a tagged variant so the table can store them
//! by value:
//!
//! | Variant | Wire form                      | Arity |
//! |---------|--------------------------------|-------|
//! | `U8`    | 1 byte                         | 1     |
//! | `U16`   | 2 bytes LE                     | 1     |
//! | `I32`   | 4 bytes LE                     | 1     |
//! | `F32`   | 4 bytes LE IEEE-754            | 1     |
//! | `Vec3F` | 12 bytes LE (three f32)        | 3     |
//! | `Str`   | u32 LE length + UTF-8 bytes    | 1     |

use std::fmt;

use thiserror::Error;

use crate::packet::PacketType;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum FieldError {
    #[error("offset {offset} with width {width} exceeds the {len}-byte payload")]
    OutOfRange { offset: usize, width: usize, len: usize },
    #[error("string field is not valid UTF-8: {0}")]
    Corrupt(#[from] std::string::FromUtf8Error),
    #[error("expected {expected} value(s), got {got}")]
    Arity { expected: usize, got: usize },
    #[error("value {value} does not fit a {repr}")]
    ValueRange { value: i64, repr: &'static str },
    #[error("cannot parse {token:?} as {repr}")]
    Cast { token: String, repr: &'static str },
    #[error("value kind does not match the {0} serializer")]
    Kind(&'static str),
}

// ── Values ───────────────────────────────────────────────────────────────────

/// One decoded field value.  Integers widen to i64 on the way out; the
/// serializer narrows them back on the way in.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f32),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            // {:?} keeps the decimal point (`1.0`, not `1`) and prints the
            // shortest digits that parse back to the same f32.
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

// ── Serializers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serializer {
    U8,
    U16,
    I32,
    F32,
    Vec3F,
    Str,
}

impl Serializer {
    /// Encoded byte width.  `None` for `Str`, whose width depends on the
    /// string it carries.
    pub fn width(self) -> Option<usize> {
        match self {
            Serializer::U8 => Some(1),
            Serializer::U16 => Some(2),
            Serializer::I32 | Serializer::F32 => Some(4),
            Serializer::Vec3F => Some(12),
            Serializer::Str => None,
        }
    }

    /// Number of values this serializer reads and writes.
    pub fn arity(self) -> usize {
        match self {
            Serializer::Vec3F => 3,
            _ => 1,
        }
    }

    fn repr(self) -> &'static str {
        match self {
            Serializer::U8 => "u8",
            Serializer::U16 => "u16",
            Serializer::I32 => "i32",
            Serializer::F32 => "f32",
            Serializer::Vec3F => "vec3f",
            Serializer::Str => "string",
        }
    }

    /// Decode this field from `body` at `offset`.
    pub fn read(self, body: &[u8], offset: usize) -> Result<Vec<Value>, FieldError> {
        let take = |width: usize| -> Result<&[u8], FieldError> {
            body.get(offset..offset + width).ok_or(FieldError::OutOfRange {
                offset,
                width,
                len: body.len(),
            })
        };
        match self {
            Serializer::U8 => Ok(vec![Value::Int(take(1)?[0] as i64)]),
            Serializer::U16 => {
                let raw = take(2)?;
                Ok(vec![Value::Int(u16::from_le_bytes(raw.try_into().unwrap()) as i64)])
            }
            Serializer::I32 => {
                let raw = take(4)?;
                Ok(vec![Value::Int(i32::from_le_bytes(raw.try_into().unwrap()) as i64)])
            }
            Serializer::F32 => {
                let raw = take(4)?;
                Ok(vec![Value::Float(f32::from_le_bytes(raw.try_into().unwrap()))])
            }
            Serializer::Vec3F => {
                let raw = take(12)?;
                Ok(raw
                    .chunks_exact(4)
                    .map(|c| Value::Float(f32::from_le_bytes(c.try_into().unwrap())))
                    .collect())
            }
            Serializer::Str => {
                let raw = take(4)?;
                let len = u32::from_le_bytes(raw.try_into().unwrap()) as usize;
                let text = body.get(offset + 4..offset + 4 + len).ok_or(FieldError::OutOfRange {
                    offset: offset + 4,
                    width: len,
                    len: body.len(),
                })?;
                Ok(vec![Value::Text(String::from_utf8(text.to_vec())?)])
            }
        }
    }

    /// Encode `values` into the wire bytes of this field.
    pub fn write(self, values: &[Value]) -> Result<Vec<u8>, FieldError> {
        if values.len() != self.arity() {
            return Err(FieldError::Arity { expected: self.arity(), got: values.len() });
        }
        match self {
            Serializer::U8 => Ok(vec![self.narrow(&values[0], 8)? as u8]),
            Serializer::U16 => Ok((self.narrow(&values[0], 16)? as u16).to_le_bytes().to_vec()),
            Serializer::I32 => Ok((self.narrow(&values[0], 32)? as u32).to_le_bytes().to_vec()),
            Serializer::F32 => match values[0] {
                Value::Float(v) => Ok(v.to_le_bytes().to_vec()),
                _ => Err(FieldError::Kind(self.repr())),
            },
            Serializer::Vec3F => {
                let mut out = Vec::with_capacity(12);
                for v in values {
                    match v {
                        Value::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
                        _ => return Err(FieldError::Kind(self.repr())),
                    }
                }
                Ok(out)
            }
            Serializer::Str => match &values[0] {
                Value::Text(s) => {
                    let mut out = Vec::with_capacity(4 + s.len());
                    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                    out.extend_from_slice(s.as_bytes());
                    Ok(out)
                }
                _ => Err(FieldError::Kind(self.repr())),
            },
        }
    }

    /// Narrow an integer value to `bits`, accepting both the signed and the
    /// unsigned interpretation of that width (`0xDEADBEEF` and its two's
    /// complement name the same four bytes).
    fn narrow(self, value: &Value, bits: u32) -> Result<u64, FieldError> {
        let v = match value {
            Value::Int(v) => *v,
            _ => return Err(FieldError::Kind(self.repr())),
        };
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << bits) - 1;
        if v < min || v > max {
            return Err(FieldError::ValueRange { value: v, repr: self.repr() });
        }
        Ok(v as u64 & ((1u64 << bits) - 1))
    }

    /// Decode parser tokens into values: integers for the integer widths,
    /// floats for `F32`/`Vec3F`, the token verbatim for `Str`.
    pub fn cast(self, tokens: &[&str]) -> Result<Vec<Value>, FieldError> {
        if tokens.len() != self.arity() {
            return Err(FieldError::Arity { expected: self.arity(), got: tokens.len() });
        }
        match self {
            Serializer::U8 | Serializer::U16 | Serializer::I32 => {
                let v = tokens[0].parse::<i64>().map_err(|_| FieldError::Cast {
                    token: tokens[0].to_string(),
                    repr: self.repr(),
                })?;
                Ok(vec![Value::Int(v)])
            }
            Serializer::F32 | Serializer::Vec3F => tokens
                .iter()
                .map(|t| {
                    t.parse::<f32>().map(Value::Float).map_err(|_| FieldError::Cast {
                        token: t.to_string(),
                        repr: self.repr(),
                    })
                })
                .collect(),
            Serializer::Str => Ok(vec![Value::Text(tokens[0].to_string())]),
        }
    }
}

// ── Layout table ─────────────────────────────────────────────────────────────

/// One row of a packet's field layout: name, absolute body offset,
/// serializer.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name:   &'static str,
    pub offset: usize,
    pub codec:  Serializer,
}

const fn field(name: &'static str, offset: usize, codec: Serializer) -> FieldSpec {
    FieldSpec { name, offset, codec }
}

/// The implicit first field of every packet.
pub const CLOCK: FieldSpec = field("clock", 0, Serializer::F32);

/// The ordered field list for a `(packet_type, subtype)` pair.
///
/// Order follows the table, not byte position; offsets may interleave.
pub fn packet_fields(ptype: PacketType, subtype: Option<i32>) -> Vec<FieldSpec> {
    use PacketType::*;
    use Serializer::*;

    let mut fields = vec![CLOCK];
    match ptype {
        EntityEnter | EntityCreate => {
            fields.push(field("player_id", 4, I32));
        }
        EntityMoveWithError => {
            fields.push(field("player_id", 4, I32));
            fields.push(field("position", 16, Vec3F));
            fields.push(field("hull_orientation", 40, Vec3F));
        }
        EntityProperty => {
            fields.push(field("player_id", 4, I32));
            fields.push(field("subtype", 8, I32));
            if subtype == Some(0x03) {
                fields.push(field("health", 16, U16));
            }
        }
        EntityMethod => {
            fields.push(field("player_id", 4, I32));
            fields.push(field("subtype", 8, I32));
            match subtype {
                Some(0x01) => {
                    fields.push(field("source", 18, I32));
                    fields.push(field("health", 16, U16));
                }
                Some(0x05) => fields.push(field("source", 16, I32)),
                Some(0x0B) => {
                    fields.push(field("source", 22, I32));
                    fields.push(field("target", 16, I32));
                }
                Some(0x17) => fields.push(field("target", 20, I32)),
                _ => {}
            }
        }
        BattleChatMessage => fields.push(field("message", 4, Str)),
        NestedEntityProperty => fields.push(field("player_id", 4, I32)),
        UpdateFpsPingLag => {
            fields.push(field("fps", 4, U8));
            fields.push(field("ping", 5, U16));
            fields.push(field("lag", 7, U8));
        }
        _ => {}
    }
    fields
}

/// The serializer a field name implies — what the textual-form parser uses
/// to decode a field line, independent of any packet context.
pub fn serializer_for(name: &str) -> Option<Serializer> {
    use Serializer::*;
    match name {
        "clock" => Some(F32),
        "player_id" | "subtype" | "source" | "target" => Some(I32),
        "position" | "hull_orientation" => Some(Vec3F),
        "health" | "ping" => Some(U16),
        "fps" | "lag" => Some(U8),
        "message" => Some(Str),
        _ => None,
    }
}
