//! Binary wire codec for the splicer's BLE protocol.
//!
//! Every message, in either direction, is one frame:
//!
//! ```text
//! [0x7e 0x7e][opcode: 1][len: u16 BE][body: len bytes][crc: u16 BE][0xaa]
//! ```
//!
//! The CRC is CRC-16/MODBUS computed over everything before it (sync, opcode,
//! length, body). Read commands carry the query marker [`QUERY`] as their
//! body; write commands are acknowledged with a single [`ACK`] byte. Both are
//! body values only -- reply correlation is by opcode, never by body byte.
//!
//! # Streaming decode
//!
//! BLE notifications are at most one MTU long, so a frame may arrive split
//! across several notifications, and short frames may arrive back to back in
//! one. [`decode_frame`] therefore operates on an accumulation buffer and
//! reports how many bytes it consumed; callers drain the buffer and call it
//! again until it returns [`DecodeOutcome::Incomplete`]. Garbage before a
//! sync sequence is skipped one byte at a time so the decoder resynchronizes
//! on the next real frame.

use bytes::{BufMut, BytesMut};

use crate::error::{DecodeError, EncodeError};
use crate::opcode::Opcode;

/// Frame sync sequence, first on the wire for every frame.
pub const SYNC: [u8; 2] = [0x7e, 0x7e];

/// Frame terminator byte, last on the wire for every frame.
pub const TERMINATOR: u8 = 0xaa;

/// Query marker: the body of a bare read command.
pub const QUERY: u8 = 0x55;

/// Acknowledgement byte: the body of a reply to a write command.
pub const ACK: u8 = 0x66;

/// Frame header length: sync (2) + opcode (1) + body length (2).
const HEADER_LEN: usize = 5;

/// Frame trailer length: crc (2) + terminator (1).
const TRAILER_LEN: usize = 3;

/// CRC-16/MODBUS: reflected polynomial 0xA001, initial value 0xFFFF, no
/// final xor.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xffff;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xa001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Result of attempting to decode one frame from an accumulation buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A complete, verified frame.
    Frame {
        /// The command or reply opcode.
        opcode: Opcode,
        /// The frame body.
        payload: Vec<u8>,
        /// Bytes consumed from the input buffer.
        consumed: usize,
    },

    /// Malformed data. `consumed` bytes should be dropped from the buffer
    /// before trying again: one byte for a sync failure (resynchronization),
    /// the whole candidate frame for a checksum, terminator, or opcode
    /// failure.
    Invalid {
        /// Why the data was rejected.
        reason: DecodeError,
        /// Bytes to drop from the input buffer.
        consumed: usize,
    },

    /// The buffer does not yet hold a complete frame. More data is needed.
    Incomplete,
}

/// Encode a command frame for transmission.
///
/// Fails with [`EncodeError::UnknownOpcode`] for opcodes that have no request
/// schema (device-to-host only) and [`EncodeError::PayloadLengthMismatch`]
/// when `params` does not match the opcode's declared width.
pub fn encode(opcode: Opcode, params: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let expected = opcode
        .request_len()
        .ok_or(EncodeError::UnknownOpcode(opcode))?;
    if params.len() != expected {
        return Err(EncodeError::PayloadLengthMismatch {
            opcode,
            expected,
            found: params.len(),
        });
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN + params.len() + TRAILER_LEN);
    buf.put_slice(&SYNC);
    buf.put_u8(opcode.code());
    buf.put_u16(params.len() as u16);
    buf.put_slice(params);
    buf.put_u16(crc16(&buf));
    buf.put_u8(TERMINATOR);
    Ok(buf.to_vec())
}

/// Attempt to decode one frame from the front of `buf`.
///
/// See the module docs for the streaming contract. The checksum and
/// terminator are verified before the opcode is looked up, mirroring the
/// device's own framing rules.
pub fn decode_frame(buf: &[u8]) -> DecodeOutcome {
    if buf.is_empty() {
        return DecodeOutcome::Incomplete;
    }
    if buf[0] != SYNC[0] {
        return DecodeOutcome::Invalid {
            reason: DecodeError::BadSync(buf[0]),
            consumed: 1,
        };
    }
    if buf.len() >= 2 && buf[1] != SYNC[1] {
        return DecodeOutcome::Invalid {
            reason: DecodeError::BadSync(buf[1]),
            consumed: 1,
        };
    }
    if buf.len() < HEADER_LEN {
        return DecodeOutcome::Incomplete;
    }

    let code = buf[2];
    let body_len = usize::from(u16::from_be_bytes([buf[3], buf[4]]));
    let total = HEADER_LEN + body_len + TRAILER_LEN;
    if buf.len() < total {
        return DecodeOutcome::Incomplete;
    }

    let crc_end = HEADER_LEN + body_len;
    let expected = crc16(&buf[..crc_end]);
    let found = u16::from_be_bytes([buf[crc_end], buf[crc_end + 1]]);
    if expected != found {
        return DecodeOutcome::Invalid {
            reason: DecodeError::BadChecksum { expected, found },
            consumed: total,
        };
    }
    let stop = buf[total - 1];
    if stop != TERMINATOR {
        return DecodeOutcome::Invalid {
            reason: DecodeError::BadTerminator(stop),
            consumed: total,
        };
    }

    match Opcode::from_code(code) {
        Some(opcode) => DecodeOutcome::Frame {
            opcode,
            payload: buf[HEADER_LEN..crc_end].to_vec(),
            consumed: total,
        },
        None => DecodeOutcome::Invalid {
            reason: DecodeError::UnknownOpcode(code),
            consumed: total,
        },
    }
}
