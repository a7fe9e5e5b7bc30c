#![no_std]
//! Wire-level data model for the handheld remote-play link.
//!
//! This crate defines the protocol shared between the **master** (the host
//! driving the link) and the **slave** (the handheld renderer): command
//! words, the frame metadata layout, the frame/diff data model, and session
//! negotiation. It does not perform any I/O; see `remote_play_wire` for the
//! transport and `remote_play_master`/`remote_play_device` for the two
//! endpoints built on top of it.
//!
//! ## Roles
//!
//! - **Master** (host): builds frames, computes diffs, drives the clock.
//! - **Slave** (handheld device): reconstructs pixels, services audio
//!   between packets, reports button state.
//!
//! A 32-bit word on the wire is always one of a [`Command`](command::Command),
//! a payload word (opaque to this crate), or a [`Metadata`](metadata::Metadata)
//! word. See [`ProtocolWord`](command::ProtocolWord) for the classification.

extern crate alloc;

pub mod command;
pub mod constants;
pub mod diff;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod session;
pub mod slave_state;

pub use command::{Command, ProtocolWord, Role};
pub use constants::*;
pub use diff::{Diff, DiffPayload};
pub use error::ProtocolError;
pub use frame::Frame;
pub use metadata::Metadata;
pub use session::SessionOptions;
pub use slave_state::SlaveFrameState;
