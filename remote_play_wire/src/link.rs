//! The abstract full-duplex transport (§4.1).

use thiserror::Error;

/// Clock speed a [`SpiLink::exchange32`] call should run at. The master
/// runs slower for command exchanges (where a human or a logic analyzer
/// might be watching) and faster for bulk payload; the choice is per call,
/// not per session. Adapters that don't distinguish clock speeds in
/// hardware are free to ignore this and always run at one rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpiSpeed {
    Slow,
    Fast,
}

/// Transport-level failure. Distinct from `remote_play_proto::ProtocolError`
/// since it describes the physical link misbehaving, not the protocol
/// state machine.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("SPI transport I/O failed: {0}")]
    Io(#[source] std::io::Error),
    #[error("link closed by peer")]
    Closed,
}

/// Full-duplex, blocking, 4-byte word exchange. No buffering, no retries:
/// every suspension point in the protocol is one call to `exchange32`.
pub trait SpiLink {
    /// Exchanges exactly one 4-byte word at `speed`. Blocks until both
    /// sides have transferred; returns the word the peer sent back.
    fn exchange32(&mut self, word: u32, speed: SpiSpeed) -> Result<u32, LinkError>;
}

/// The slave side's extra entry point: an exchange that can substitute a
/// different word when the caller wants to break out of a bulk transfer
/// (§4.6 "Suspension points"), rather than the word it would otherwise
/// send. There is no mid-word abort on this transport, so the exchange
/// always completes; the peer learns about the break from the substituted
/// word, not from the transfer being skipped, which keeps both sides'
/// call counts lockstep even across a break.
pub trait BreakableSpiLink: SpiLink {
    /// Sends `word` unless `may_break` returns `true`, in which case
    /// `break_word` is sent instead. Returns the peer's reply together
    /// with whether the break happened.
    fn transfer_breakable(
        &mut self,
        word: u32,
        break_word: u32,
        may_break: &mut dyn FnMut() -> bool,
    ) -> Result<(u32, bool), LinkError> {
        let broke = may_break();
        let sent = if broke { break_word } else { word };
        let received = self.exchange32(sent, SpiSpeed::Fast)?;
        Ok((received, broke))
    }
}
