//! # Simulated Host
//!
//! In-process implementation of the host channel contract, plus a small
//! line-oriented calculator engine, for exercising the bridge without
//! firmware.
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! Embedded bridge code is hard to test because the host side is usually a
//! mailbox in someone else's firmware. The simulated host runs the same
//! contract in-process:
//! - Runs under `cargo test`
//! - Deterministic (scripted input, virtual time, no real concurrency)
//! - Fast (no mailbox, no hardware)
//! - Inspectable (output, call counts and the clock are all readable)
//!
//! This is not a mock of convenience: it is a full implementation of the
//! channel contract, including its awkward corners (short writes, buffers
//! that go empty between poll and read, rejection of unknown buffer ids).

mod calc;
mod channel;

pub use calc::CalcEngine;
pub use channel::{ChannelCounters, OutputTap, SimChannel};
