//! The service surface handed to the engine.
//!
//! One context value wires console, arena and root capture together and is
//! threaded through every engine call - dependency injection instead of a
//! process-wide singleton, so two bridge instances could coexist without
//! sharing anything.

use engine_api::{AllocError, EngineFault, EngineServices, FileError, ImportStat, ObjRef};
use host_channel::HostChannel;

use crate::heap::Heap;
use crate::io::Console;
use crate::layout::StackRegion;
use crate::roots;

/// Everything the engine may touch during one bridge invocation.
pub struct BridgeContext<'c, C: HostChannel + ?Sized> {
    console: Console<'c, C>,
    heap: Heap,
    stack_top: usize,
    collections: usize,
}

impl<'c, C: HostChannel + ?Sized> BridgeContext<'c, C> {
    /// Builds the context over an already-validated layout
    pub fn new(channel: &'c mut C, heap: Heap, stack: StackRegion) -> Self {
        Self {
            console: Console::new(channel),
            heap,
            stack_top: stack.top(),
            collections: 0,
        }
    }

    /// The arena
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Collections forced by allocation pressure during this invocation
    pub fn collections(&self) -> usize {
        self.collections
    }

    pub(crate) fn console_mut(&mut self) -> &mut Console<'c, C> {
        &mut self.console
    }
}

impl<'c, C: HostChannel + ?Sized> EngineServices for BridgeContext<'c, C> {
    fn read_char(&mut self) -> Result<u8, EngineFault> {
        // A failing host channel has no recovery path
        self.console.read_char().map_err(|_| EngineFault::Fault)
    }

    fn write_text(&mut self, bytes: &[u8]) {
        self.console.write_all(bytes);
    }

    fn alloc(&mut self, len: usize) -> Result<ObjRef, AllocError> {
        if let Ok(obj) = self.heap.alloc_bytes(len) {
            return Ok(obj);
        }
        // Allocation pressure: one synchronous stop-the-world collection,
        // then one retry. The capture happens right here so every mutator
        // frame above this call is inside the scanned span.
        let roots = roots::capture(self.stack_top);
        self.heap.collect(&roots);
        self.collections += 1;
        self.heap.alloc_bytes(len)
    }

    fn obj_bytes_mut(&mut self, obj: ObjRef) -> Option<&mut [u8]> {
        self.heap.payload_mut(obj)
    }

    fn write_obj(&mut self, obj: ObjRef) {
        let Self { console, heap, .. } = self;
        if let Some(bytes) = heap.payload(obj) {
            console.write_all(bytes);
        }
    }

    fn import_stat(&mut self, _path: &str) -> ImportStat {
        // No filesystem exists; every lookup misses
        ImportStat::NoSuchEntry
    }

    fn open_file(&mut self, _path: &str) -> Result<(), FileError> {
        Err(FileError::NoSuchEntry)
    }

    fn delay_ms(&mut self, millis: u32) {
        self.console.delay_ms(millis);
    }

    fn timestamp_ms(&mut self) -> u32 {
        self.console.timestamp_ms()
    }
}
