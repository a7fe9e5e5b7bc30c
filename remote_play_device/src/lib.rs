//! Handheld (slave) side of the remote-play link: decompression/blit,
//! VBlank-gated audio servicing, and the slave frame loop.

pub mod decompress;
pub mod error;
pub mod session;
pub mod traits;
pub mod vblank;

pub use decompress::Decompressor;
pub use error::DeviceError;
pub use session::SlaveSession;
pub use traits::PlayerDriver;
pub use vblank::VBlankTracker;
