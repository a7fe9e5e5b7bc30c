//! An in-memory, two-thread transport pairing one [`SpiLink`] endpoint with
//! its peer, for demos and integration tests that don't have real SPI
//! hardware to talk to.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use remote_play_wire::link::{BreakableSpiLink, LinkError, SpiLink, SpiSpeed};

/// One end of a loopback link. `exchange32` sends on this end's outbound
/// channel and blocks on its inbound channel, so the two ends of a
/// [`LoopbackSpiLink::pair`] must run on separate threads to avoid
/// deadlocking each other.
pub struct LoopbackSpiLink {
    tx: SyncSender<u32>,
    rx: Receiver<u32>,
}

impl LoopbackSpiLink {
    /// Builds a connected pair: `(master_end, slave_end)`. Both rendezvous
    /// channels have zero capacity, so a `send` only completes once the
    /// peer is blocked on the matching `recv` — mirroring the real link's
    /// lockstep, no-buffering contract (§4.1).
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = sync_channel(0);
        let (tx_b, rx_b) = sync_channel(0);
        (
            LoopbackSpiLink { tx: tx_a, rx: rx_b },
            LoopbackSpiLink { tx: tx_b, rx: rx_a },
        )
    }
}

impl SpiLink for LoopbackSpiLink {
    fn exchange32(&mut self, word: u32, _speed: SpiSpeed) -> Result<u32, LinkError> {
        self.tx.send(word).map_err(|_| LinkError::Closed)?;
        self.rx.recv().map_err(|_| LinkError::Closed)
    }
}

impl BreakableSpiLink for LoopbackSpiLink {}
