//! The slave's player boundary (§1/§6): feeding and pumping a loopback
//! audio player one step at a time, cooperatively, between transfers.

/// A cooperatively-scheduled audio player. `pump` never blocks longer than
/// one processing step; it is called once per VBlank, outside any SPI
/// transfer.
pub trait PlayerDriver {
    /// Whether the player is ready to accept another chunk.
    fn needs_data(&self) -> bool;
    /// Feeds one audio chunk (already sized to `AUDIO_CHUNK_SIZE`) to the
    /// player.
    fn feed(&mut self, chunk: &[u8]);
    /// Advances the player by one cooperative step.
    fn pump(&mut self);
}
