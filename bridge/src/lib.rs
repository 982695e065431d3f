//! # Bridge
//!
//! Embeds a garbage-collected, bytecode-interpreted language engine into a
//! bare-metal host that exposes nothing but a five-operation capability
//! table.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: The host channel is a context value
//!   threaded through every call, never a process-wide singleton
//! - **One unsafe boundary**: Conservative register and stack scanning is
//!   inherently type-unsafe; it lives in [`roots`] behind a safe capture
//!   operation, and everything above it - marking, sweeping, allocation -
//!   is safe code
//! - **Terminal states are states**: An unrecoverable fault transitions the
//!   lifecycle to `Halted` and spins; with no process model to fall back
//!   on, an inert loop is the safest thing a watchdog can observe
//! - **Single thread of control**: Collections are synchronous and
//!   triggered only by allocation pressure on the mutator's own thread;
//!   no locking discipline exists because no second thread does
//!
//! ## Module map
//!
//! - [`layout`] - stack and heap extents, guard margin, disjointness
//! - [`roots`] - register flush + live stack span capture
//! - [`heap`] - conservative mark-and-sweep block arena
//! - [`io`] - character console over the host channel
//! - [`fatal`] - fault taxonomy and the halt strategy
//! - [`context`] - the service surface handed to the engine
//! - [`lifecycle`] - the re-enterable entry point and its state machine

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod context;
pub mod fatal;
pub mod heap;
pub mod io;
pub mod layout;
pub mod lifecycle;
pub mod roots;

pub use context::BridgeContext;
pub use fatal::{FatalFault, HaltStrategy, SpinHalt};
pub use heap::{CollectStats, Heap, HeapStats};
pub use io::Console;
pub use layout::{HeapRegion, LayoutError, MemoryLayout, StackRegion, DEFAULT_GUARD_MARGIN};
pub use lifecycle::{
    Bridge, BridgeConfig, BridgePhase, PhaseHandle, ReplMode, DEFAULT_HEAP_BYTES, STATUS_SUCCESS,
};
pub use roots::RootSet;
