//! Host (master) side of the remote-play link: frame capture, diff
//! encoding, palette lookup, and the master frame loop.

pub mod encoder;
pub mod error;
pub mod palette;
pub mod session;
pub mod traits;

pub use encoder::DiffEncoder;
pub use error::MasterError;
pub use palette::PaletteLut;
pub use session::MasterSession;
pub use traits::{AudioSource, FrameSource, GamepadSink};
