//! Services the bridge supplies to the engine.

use core::fmt;
use thiserror::Error;

use crate::engine::EngineFault;

/// Reference to one live object in the bridge arena.
///
/// An `ObjRef` is the raw address of the object's first payload byte. That
/// representation is load-bearing: the collector scans registers and the
/// native stack conservatively, so a reference is only considered live while
/// its bit pattern sits in a scanned stack slot or register (or inside
/// another live arena object). Holding the only `ObjRef` to an object in
/// host-heap memory the collector never sees will get the object reclaimed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(usize);

impl ObjRef {
    /// Builds a reference from a raw arena payload address
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw payload address
    pub const fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({:#x})", self.0)
    }
}

/// Allocation failure after the collector has already been given its chance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Nothing reclaimable was left and the request still does not fit.
    ///
    /// This is the unrecoverable out-of-memory tier: the engine is expected
    /// to escalate it as a fault rather than report it as text.
    #[error("allocation of {0} bytes exhausted the arena")]
    Exhausted(usize),
}

/// What the import-path resolver reports for a path.
///
/// The bridge has no filesystem, so resolution always yields
/// [`ImportStat::NoSuchEntry`]; the other variants exist only so richer
/// hosts can share the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStat {
    /// No such entry exists
    NoSuchEntry,
    /// The path names a file
    File,
    /// The path names a directory
    Dir,
}

/// Why a file open request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FileError {
    /// No such entry exists (the only answer this bridge ever gives)
    #[error("no such entry")]
    NoSuchEntry,
}

/// The capability surface the bridge exposes to the engine.
///
/// Everything the engine can do to the outside world goes through this
/// trait: it has no ambient authority of its own.
pub trait EngineServices {
    /// Blocking single-character read from the console buffer.
    ///
    /// No internal buffering, no echo; echo, if any, is a host or terminal
    /// responsibility. Errors indicate a failing host channel, which has no
    /// recovery path.
    fn read_char(&mut self) -> Result<u8, EngineFault>;

    /// Writes text to the console buffer.
    ///
    /// One host write call per request; a short write is not retried and
    /// the written count is discarded.
    fn write_text(&mut self, bytes: &[u8]);

    /// Allocates `len` bytes from the bridge arena.
    ///
    /// A first failed attempt triggers exactly one synchronous collection
    /// and one retry; `Err` therefore already means "nothing reclaimable".
    fn alloc(&mut self, len: usize) -> Result<ObjRef, AllocError>;

    /// Mutable view of a live object's payload, or `None` for a stale or
    /// foreign reference
    fn obj_bytes_mut(&mut self, obj: ObjRef) -> Option<&mut [u8]>;

    /// Writes a live object's payload to the console buffer
    fn write_obj(&mut self, obj: ObjRef);

    /// Resolves an import path. Always [`ImportStat::NoSuchEntry`] here.
    fn import_stat(&mut self, path: &str) -> ImportStat;

    /// Opens a source file. Always fails here; the engine is expected to
    /// surface the failure as one of its own recoverable errors.
    fn open_file(&mut self, path: &str) -> Result<(), FileError>;

    /// Cooperative delay, no buffer side effects
    fn delay_ms(&mut self, millis: u32);

    /// Milliseconds since an arbitrary host origin; wraps
    fn timestamp_ms(&mut self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obj_ref_round_trip() {
        let obj = ObjRef::from_addr(0x2000_0040);
        assert_eq!(obj.addr(), 0x2000_0040);
        assert_eq!(format!("{:?}", obj), "ObjRef(0x20000040)");
    }

    #[test]
    fn test_alloc_error_names_the_request() {
        let err = AllocError::Exhausted(96);
        assert_eq!(err.to_string(), "allocation of 96 bytes exhausted the arena");
    }
}
