//! Fatal error sink.
//!
//! The terminal tier of the error model. Nothing here unwinds, cleans up,
//! or returns: the hosting environment has no process to exit into, so the
//! only safe observable state after an unrecoverable fault is an inert spin
//! that an external watchdog or host-side reset can detect.

use core::fmt;
use serde::{Deserialize, Serialize};

use engine_api::EngineFault;

/// The three unrecoverable fault classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FatalFault {
    /// The engine's error-propagation mechanism itself failed - an error
    /// raised with no handler context left to receive it
    PropagationFailure,

    /// Unrecoverable condition with no defined recovery, e.g. allocator
    /// exhaustion with nothing reclaimable
    Fault,

    /// Assertion failure in a debug build
    DebugAssertion,
}

impl FatalFault {
    /// Best-effort diagnostic to emit before halting, if any.
    ///
    /// Only the propagation failure gets one. The other two classes halt
    /// silently: at that depth of failure no channel is assumed safe to
    /// use.
    pub const fn diagnostic(self) -> Option<&'static [u8]> {
        match self {
            FatalFault::PropagationFailure => Some(b"fatal: error propagation failed\n"),
            FatalFault::Fault | FatalFault::DebugAssertion => None,
        }
    }
}

impl fmt::Display for FatalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalFault::PropagationFailure => write!(f, "error propagation failed"),
            FatalFault::Fault => write!(f, "unrecoverable fault"),
            FatalFault::DebugAssertion => write!(f, "assertion failed"),
        }
    }
}

impl From<EngineFault> for FatalFault {
    fn from(fault: EngineFault) -> Self {
        match fault {
            EngineFault::PropagationFailure => FatalFault::PropagationFailure,
            EngineFault::Fault => FatalFault::Fault,
        }
    }
}

/// How the bridge leaves the world once a fault is terminal.
///
/// A seam rather than a hard-coded loop so tests can observe the halt
/// without hanging; production embeddings use [`SpinHalt`]. An embedding
/// image wires its panic or debug assertion handler to the same strategy
/// with [`FatalFault::DebugAssertion`], so a failed assertion halts
/// silently instead of attempting any return.
pub trait HaltStrategy {
    /// Enters the terminal halt state. Must not return, allocate, or touch
    /// the host channel.
    fn halt(&mut self, fault: FatalFault) -> !;
}

/// Production halt: a tight inert loop awaiting external reset.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinHalt;

impl HaltStrategy for SpinHalt {
    fn halt(&mut self, _fault: FatalFault) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
}
