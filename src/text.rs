//! Line-oriented textual form of a packet stream.
//!
//! # Layout
//!
//! ```text
//! begin <packet_type_name>
//! <lowercase hex of the full payload body, clock bytes included>
//! <blank line>
//! <offset> <field_name> <value> [<value>...]
//! ...
//! end
//! <blank line>
//! ```
//!
//! Offsets are right-aligned to four columns.  Every field's values are
//! single-space separated tokens except `message`, whose value is the rest
//! of the line verbatim — embedded spaces survive, embedded newlines cannot
//! (a chat message containing a newline does not round-trip through this
//! form).
//!
//! # Parser
//! A three-state machine: `Initial` → (`begin` line) → `Begin` → (hex line)
//! → `Properties` → (`end` line) → `Initial`.  Blank lines are skipped in
//! every state.  Field lines overwrite the serializer's width at the given
//! offset in the body decoded from the hex line — the hex dump is the
//! packet; field lines are edits applied on top of it.  Anything else is a
//! syntax error carrying the 1-based line number.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::fields::{packet_fields, serializer_for, FieldError, Serializer};
use crate::packet::{read_packet, write_packet, PacketError, PacketType};

#[derive(Error, Debug)]
pub enum TextError {
    #[error("syntax error at line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    #[error("syntax error: unexpected end of input")]
    UnexpectedEof,
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn syntax(line: usize, reason: impl Into<String>) -> TextError {
    TextError::Syntax { line, reason: reason.into() }
}

// ── Disassembly ──────────────────────────────────────────────────────────────

/// Render a binary packet stream into the textual form.
pub fn disassemble<R: io::Read, W: Write>(mut r: R, mut w: W) -> Result<(), TextError> {
    while let Some(packet) = read_packet(&mut r)? {
        writeln!(w, "begin {}", packet.ptype.name())?;
        writeln!(w, "{}", hex::encode(&packet.body))?;
        writeln!(w)?;
        for field in packet_fields(packet.ptype, packet.subtype) {
            let values = field.codec.read(&packet.body, field.offset)?;
            let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            writeln!(w, "{:4} {} {}", field.offset, field.name, rendered.join(" "))?;
        }
        writeln!(w, "end")?;
        writeln!(w)?;
    }
    Ok(())
}

// ── Assembly ─────────────────────────────────────────────────────────────────

enum State {
    Initial,
    Begin { ptype: PacketType },
    Properties { ptype: PacketType, body: Vec<u8> },
}

/// Parse the textual form back into a binary packet stream.
pub fn assemble<R: BufRead, W: Write>(r: R, mut w: W) -> Result<(), TextError> {
    let mut state = State::Initial;

    for (idx, line) in r.lines().enumerate() {
        let line = line?;
        let lineno = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        state = match state {
            State::Initial => {
                let name = line
                    .strip_prefix("begin ")
                    .ok_or_else(|| syntax(lineno, "expected `begin <packet type>`"))?
                    .trim();
                let ptype = PacketType::from_name(name)
                    .ok_or_else(|| syntax(lineno, format!("unknown packet type {name:?}")))?;
                State::Begin { ptype }
            }
            State::Begin { ptype } => {
                let body = hex::decode(line.trim())
                    .map_err(|_| syntax(lineno, "expected a hex payload dump"))?;
                State::Properties { ptype, body }
            }
            State::Properties { ptype, mut body } => {
                if line.trim() == "end" {
                    write_packet(&mut w, ptype, &body)?;
                    State::Initial
                } else {
                    apply_field(&line, &mut body, lineno)?;
                    State::Properties { ptype, body }
                }
            }
        };
    }

    match state {
        State::Initial => Ok(()),
        _ => Err(TextError::UnexpectedEof),
    }
}

/// Parse one `<offset> <name> <values…>` line and overwrite the field's
/// bytes inside `body`.
fn apply_field(line: &str, body: &mut [u8], lineno: usize) -> Result<(), TextError> {
    let trimmed = line.trim_start();
    let mut parts = trimmed.splitn(3, ' ');
    let offset_token = parts.next().unwrap_or("");
    let name = parts
        .next()
        .ok_or_else(|| syntax(lineno, "expected `<offset> <field> <values>`"))?;
    let rest = parts.next().unwrap_or("");

    let offset: usize = offset_token
        .parse()
        .map_err(|_| syntax(lineno, format!("invalid field offset {offset_token:?}")))?;
    let codec = serializer_for(name)
        .ok_or_else(|| syntax(lineno, format!("unknown field {name:?}")))?;

    // `message` takes the rest of the line verbatim; everything else is
    // whitespace-separated tokens.
    let values = if codec == Serializer::Str {
        codec.cast(&[rest])
    } else {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        codec.cast(&tokens)
    }
    .map_err(|e| syntax(lineno, e.to_string()))?;

    let bytes = codec.write(&values).map_err(|e| syntax(lineno, e.to_string()))?;
    let end = match offset.checked_add(bytes.len()) {
        Some(end) if end <= body.len() => end,
        _ => {
            return Err(syntax(
                lineno,
                format!(
                    "field of {} bytes at offset {offset} does not fit the {}-byte payload",
                    bytes.len(),
                    body.len()
                ),
            ))
        }
    };
    body[offset..end].copy_from_slice(&bytes);
    Ok(())
}
