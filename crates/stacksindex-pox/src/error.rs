//! Error types for the synthetic-event decode pipeline.

use thiserror::Error;

/// Errors that can occur while decoding a PoX print-log payload.
///
/// A `DecodeError` is fatal for the payload in question: it means the
/// decoder's protocol knowledge is stale or the envelope is malformed, and
/// must never be silently absorbed. A failed on-chain call (outer
/// `ResponseErr`) is *not* an error — the decoder returns `None` for it.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Truncated value: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("Unknown type prefix 0x{prefix:02x} at offset {offset}")]
    UnknownTypePrefix { prefix: u8, offset: usize },

    #[error("Trailing bytes after value: {count}")]
    TrailingBytes { count: usize },

    #[error("Type mismatch for '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Value for '{field}' out of range: {value}")]
    OutOfRange { field: String, value: String },

    #[error("Unknown stacking operation: {name}")]
    UnknownOperation { name: String },

    #[error("Invalid principal: {reason}")]
    InvalidPrincipal { reason: String },

    #[error("PoX address conversion failed: {reason}")]
    PoxAddress { reason: String },

    #[error("Balance patch failed for {kind}: {reason}")]
    BalancePatch { kind: &'static str, reason: &'static str },
}
