//! Protocol-level error kinds (§7). Hand-rolled `Display`/`Error`, matching
//! how `no_std` types in the rest of this workspace's data-model crate are
//! reported (no `thiserror` dependency here; the `std` crates built on top
//! of this one are free to wrap these in richer error types).

use core::fmt;

/// Errors the protocol core itself recognizes. Transport failures (SPI
/// init, framebuffer/audio pipe setup) are not represented here: they are
/// fatal at startup and owned by whichever crate talks to the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// An expected sync handshake failed: wrong echo, a `CMD_RESET`
    /// received where progress was expected, or (on the slave) two
    /// consecutive VBlanks without making progress.
    Desync,
    /// A value that was supposed to be echoed back unchanged (metadata,
    /// keys) came back different.
    EchoMismatch,
    /// The decoded metadata word is internally inconsistent (e.g.
    /// `start_pixel` outside the frame).
    InvalidMetadata,
    /// A slave-initiated mid-transfer abort to service audio. Recovered
    /// locally by the reliable stream (`sync(CMD_RECOVERY)`); never
    /// expected to escape it.
    Break,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Desync => write!(f, "sync handshake failed"),
            ProtocolError::EchoMismatch => write!(f, "echoed value did not match what was sent"),
            ProtocolError::InvalidMetadata => write!(f, "metadata word is not well-formed"),
            ProtocolError::Break => write!(f, "slave broke the transfer to service audio"),
        }
    }
}

impl core::error::Error for ProtocolError {}
