//! Transport layer for the handheld remote-play link: the abstract
//! full-duplex word exchange ([`link::SpiLink`]), the reliable packet
//! stream built on top of it ([`reliable::ReliableStream`]), and the word
//! packing helpers both endpoints share.
//!
//! This crate owns byte order: callers always hand `exchange32` a
//! host-order `u32`; big-endian wire conversion happens at the link
//! boundary, never above it.

pub mod link;
pub mod pack;
pub mod reliable;

pub use link::{BreakableSpiLink, SpiLink, SpiSpeed};
pub use reliable::{ReceiveOutcome, ReliableStream, SendOutcome};
