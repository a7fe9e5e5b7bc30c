//! Test and demo scaffolding for the remote-play link: an in-memory
//! transport and synthetic capability implementations, so the protocol can
//! be exercised end-to-end without real SPI hardware.

pub mod loopback;
pub mod synthetic;

pub use loopback::LoopbackSpiLink;
