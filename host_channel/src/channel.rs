//! The five-operation host capability table.

use core::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw sentinel hosts use for "wait forever" in their millisecond fields.
pub const WAIT_INDEFINITE_RAW: u32 = u32::MAX;

/// Identifier of one logical byte buffer on the host side.
///
/// The host may expose several buffers; this code module only ever uses
/// [`BufferId::REPL`], for both directions. All other ids are reserved for
/// host-internal channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId(u32);

impl BufferId {
    /// The interactive console buffer, input and output alike.
    pub const REPL: BufferId = BufferId(0);

    /// Creates a buffer id from a raw host value
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw host value
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf:{}", self.0)
    }
}

/// How long a [`HostChannel::poll`] call may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wait {
    /// Block for at most this many milliseconds
    Millis(u32),
    /// Block until at least one byte is available
    Indefinite,
}

impl Wait {
    /// Decodes the host's raw millisecond field, where `u32::MAX` means
    /// "wait forever".
    pub const fn from_raw(raw: u32) -> Self {
        if raw == WAIT_INDEFINITE_RAW {
            Wait::Indefinite
        } else {
            Wait::Millis(raw)
        }
    }

    /// Encodes back into the host's raw millisecond field
    pub const fn as_raw(self) -> u32 {
        match self {
            Wait::Millis(ms) => ms,
            Wait::Indefinite => WAIT_INDEFINITE_RAW,
        }
    }
}

/// Outcome of a poll that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollStatus {
    /// At least one byte is available for reading
    Ready,
    /// The timeout elapsed first; try again later
    TimedOut,
}

impl PollStatus {
    /// True if data is available
    pub const fn is_ready(self) -> bool {
        matches!(self, PollStatus::Ready)
    }
}

/// Errors a host operation can report.
///
/// These mirror the status words hosts return through the callback table.
/// The normal-path contract is deliberately narrow: `peek` cannot fail, and
/// an empty buffer is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// A parameter was rejected by the host (e.g. an unknown buffer id)
    #[error("invalid parameter")]
    InvalidParameter,

    /// A host-side buffer limit was exceeded
    #[error("buffer overflow")]
    BufferOverflow,

    /// The host does not implement this operation
    #[error("not implemented")]
    NotImplemented,

    /// The host is not in a state where this operation is valid
    #[error("invalid state")]
    InvalidState,
}

/// The capability table supplied by the embedding host.
///
/// Five synchronous operations plus a timestamp accessor, each of which may
/// block the sole thread of control. There is no way to abort an in-flight
/// call; the bridge assumes no other work exists to interleave.
///
/// # Contract
///
/// - `peek` is non-blocking and returns 0 for an empty buffer, never an
///   error.
/// - `poll` followed by `read` is the only safe way to block for input:
///   `read` itself must never block.
/// - After `peek` reports at least one byte, `poll(Wait::Millis(0))` must
///   return [`PollStatus::Ready`] and a one-byte `read` must return 1,
///   without blocking.
/// - `write` of an empty slice is a no-op returning `Ok(0)`.
/// - `write` may report fewer bytes than requested; whether short writes
///   occur in practice, and whether retrying is meaningful, is
///   host-defined.
pub trait HostChannel {
    /// Returns how many bytes are available for reading, without blocking
    fn peek(&mut self, buf: BufferId) -> usize;

    /// Blocks until data is available or the wait elapses
    fn poll(&mut self, buf: BufferId, wait: Wait) -> Result<PollStatus, ChannelError>;

    /// Copies up to `dest.len()` already-available bytes; never blocks
    fn read(&mut self, buf: BufferId, dest: &mut [u8]) -> Result<usize, ChannelError>;

    /// Writes `src`, returning how many bytes the host actually accepted
    fn write(&mut self, buf: BufferId, src: &[u8]) -> Result<usize, ChannelError>;

    /// Cooperatively waits for the given number of milliseconds.
    ///
    /// No side effects on any buffer.
    fn delay_ms(&mut self, millis: u32);

    /// Milliseconds since an arbitrary origin (usually host startup); wraps
    fn timestamp_ms(&mut self) -> u32;
}

/// The four host-defined 32-bit words passed alongside the capability table
/// at the entry point.
///
/// Reserved for host-specific parameters; the bridge carries them opaquely
/// and never interprets them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostArgs(pub [u32; 4]);

impl HostArgs {
    /// All-zero arguments, for hosts that pass nothing
    pub const fn none() -> Self {
        Self([0; 4])
    }
}
