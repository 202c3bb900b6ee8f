//! Error types for the splicer protocol stack.
//!
//! Each layer has its own error enum: [`EncodeError`] and [`DecodeError`] for
//! the pure codec and record-decoding functions, [`TransportError`] for the
//! BLE link, and [`ProtocolError`] for the engine-facing operations. The
//! engine-level [`Result`] alias uses [`ProtocolError`], into which the lower
//! layers convert via `From`.

use crate::opcode::Opcode;

/// Failure to encode a command frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The opcode has no registered request schema (it only ever appears in
    /// device-to-host frames, e.g. image parts or async events).
    #[error("no request schema registered for opcode {0:?}")]
    UnknownOpcode(Opcode),

    /// The caller-supplied parameter bytes do not match the opcode's declared
    /// request payload width.
    #[error("payload length mismatch for {opcode:?}: expected {expected} bytes, got {found}")]
    PayloadLengthMismatch {
        /// The opcode being encoded.
        opcode: Opcode,
        /// The payload width the opcode's schema declares.
        expected: usize,
        /// The number of bytes actually supplied.
        found: usize,
    },
}

/// Failure to decode wire data or a structured record payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input was empty where a payload was required.
    #[error("empty payload")]
    Empty,

    /// The frame's opcode byte is not a known command code.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// A byte that is not part of the frame sync sequence was found where a
    /// frame should start.
    #[error("bad sync byte {0:#04x}")]
    BadSync(u8),

    /// The frame checksum did not verify.
    #[error("bad checksum: expected {expected:#06x}, found {found:#06x}")]
    BadChecksum {
        /// The checksum computed over the received header and body.
        expected: u16,
        /// The checksum carried in the frame trailer.
        found: u16,
    },

    /// The frame did not end with the terminator byte.
    #[error("bad frame terminator {0:#04x}")]
    BadTerminator(u8),

    /// A record payload ended before the next field could be read.
    #[error("truncated record: needed {needed} more bytes, {remaining} remaining")]
    TruncatedRecord {
        /// Bytes required by the next field.
        needed: usize,
        /// Bytes actually remaining in the input.
        remaining: usize,
    },

    /// Bytes remained in a record payload after the last field. A layout
    /// drift must surface as an error, never as silently dropped data.
    #[error("{remaining} trailing bytes after record")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        remaining: usize,
    },

    /// Image data ended mid-element ({0} bytes available).
    #[error("truncated image data ({0} bytes)")]
    TruncatedImage(usize),

    /// Image data expanded to the wrong total size.
    #[error("image size mismatch: expected {expected} bytes, found {found}")]
    ImageSize {
        /// The size the device declared.
        expected: usize,
        /// The size actually produced.
        found: usize,
    },

    /// The device reported a mode byte outside the known mode set.
    #[error("unknown mode code {0:#04x}")]
    UnknownMode(u8),

    /// A counter payload carried a value too large for a record index.
    #[error("counter value {0} exceeds index range")]
    IndexRange(u64),
}

/// Failure at the BLE transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An underlying I/O error from the platform BLE stack.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No notification arrived within the requested deadline.
    #[error("timed out waiting for notification")]
    Timeout,

    /// No connection to the device has been established, or it was lost.
    #[error("not connected")]
    NotConnected,
}

/// Failure of an engine-level command exchange.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A request is already in flight. The device processes one command at a
    /// time; the engine enforces the same discipline instead of queueing.
    #[error("a request is already in flight")]
    Busy,

    /// No matching reply arrived within the configured command timeout.
    #[error("timeout waiting for reply")]
    Timeout,

    /// The device replied with a frame whose opcode does not match the
    /// pending request, and the matching reply never arrived.
    #[error("unexpected reply opcode: expected {expected:?}, found {found:?}")]
    UnexpectedOpcode {
        /// The reply opcode the pending request expects.
        expected: Opcode,
        /// The opcode actually decoded.
        found: Opcode,
    },

    /// A write command was answered with something other than the ACK byte.
    #[error("command {opcode:?} rejected by device: {body:02x?}")]
    Rejected {
        /// The command that was refused.
        opcode: Opcode,
        /// The reply body the device sent instead of an ACK.
        body: Vec<u8>,
    },

    /// An image part arrived for a different image than the one being
    /// collected.
    #[error("image part for handle {found:#04x} while collecting {expected:#04x}")]
    ImageHandle {
        /// The handle from the record metadata.
        expected: u8,
        /// The handle carried by the offending part.
        found: u8,
    },

    /// The request frame could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A reply payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The transport failed while writing or receiving.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The engine's background reader has shut down.
    #[error("protocol engine closed")]
    Closed,
}

/// A convenience `Result` alias for engine-level operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
