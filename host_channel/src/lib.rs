//! # Host Channel
//!
//! This crate defines the capability table through which an embedded code
//! module talks to its host.
//!
//! ## Philosophy
//!
//! **The host boundary must be fully abstracted and swappable.**
//!
//! The embedding host hands the code module exactly one thing: a table of
//! five I/O and timing operations over logical byte buffers. Nothing else
//! crosses the boundary. Modeling that table as a trait keeps every consumer
//! testable against an in-process implementation and keeps host-specific
//! assumptions out of the core.
//!
//! ## Design Principles
//!
//! 1. **Trait-based**: No raw function pointers; any type satisfying
//!    [`HostChannel`] is a valid host
//! 2. **Single thread of control**: Every operation may block the sole
//!    thread, up to the requested timeout or forever
//! 3. **No cancellation**: A poll timeout is a cooperative hint honored by
//!    the host, not a preemptive interrupt
//! 4. **Explicit over implicit**: Timeouts, buffer ids and status codes are
//!    typed, never magic integers

#![cfg_attr(not(test), no_std)]

pub mod channel;

pub use channel::{
    BufferId, ChannelError, HostArgs, HostChannel, PollStatus, Wait, WAIT_INDEFINITE_RAW,
};
