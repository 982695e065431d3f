//! Stack and heap configuration.
//!
//! Establishes the stack bounds and heap extent before any allocation
//! occurs. The checks here are correctness preconditions, not recoverable
//! errors: a heap that overlaps the stack, or a guard margin that eats the
//! whole stack, makes every later scan and allocation unsound, so
//! construction fails and the lifecycle treats that as fatal.

use thiserror::Error;

/// Default stack headroom reserved for the engine's own native call depth.
///
/// Must exceed the deepest expected native call chain of the engine's
/// evaluator; the evaluator checks against the resulting limit to refuse
/// recursion it cannot afford.
pub const DEFAULT_GUARD_MARGIN: usize = 1024;

/// Errors in the memory layout preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The guard margin leaves no usable stack
    #[error("guard margin {guard} does not fit inside the stack extent {extent}")]
    GuardExhaustsStack { guard: usize, extent: usize },

    /// The claimed stack extent reaches below address zero
    #[error("stack extent {extent} underflows the address space")]
    BadExtent { extent: usize },

    /// The heap region is empty or inverted
    #[error("empty heap region")]
    EmptyHeap,

    /// Stack and heap regions intersect
    #[error("heap region overlaps the stack region")]
    Overlap,
}

/// The bridge's usable native stack, delimited by addresses.
///
/// `top` is the highest address of the stack (stacks grow downward here);
/// `limit` is the lowest address the engine may let its native recursion
/// reach. The span below `limit` is the guard margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    top: usize,
    limit: usize,
    bottom: usize,
}

impl StackRegion {
    /// Builds a stack region from raw extents, e.g. linker symbols.
    ///
    /// `limit` comes out as `bottom + guard_margin`: the usable depth is the
    /// raw extent minus the guard.
    pub fn from_raw(top: usize, bottom: usize, guard_margin: usize) -> Result<Self, LayoutError> {
        if bottom >= top {
            return Err(LayoutError::BadExtent {
                extent: top.wrapping_sub(bottom),
            });
        }
        let extent = top - bottom;
        if guard_margin >= extent {
            return Err(LayoutError::GuardExhaustsStack {
                guard: guard_margin,
                extent,
            });
        }
        Ok(Self {
            top,
            limit: bottom + guard_margin,
            bottom,
        })
    }

    /// Captures the current stack frame address as the region top.
    ///
    /// The stand-in for a linker-provided stack-top symbol on hosts that do
    /// not expose one. Inlined into the caller so the captured address sits
    /// in the *caller's* frame: every function invoked after this call runs
    /// below it and therefore inside the scanned span. Call it from the
    /// embedder's outermost frame, before constructing the engine or any
    /// other holder of arena references.
    #[inline(always)]
    pub fn capture(extent: usize, guard_margin: usize) -> Result<Self, LayoutError> {
        let anchor = 0u8;
        let top = core::ptr::addr_of!(anchor) as usize;
        let bottom = top
            .checked_sub(extent)
            .ok_or(LayoutError::BadExtent { extent })?;
        Self::from_raw(top, bottom, guard_margin)
    }

    /// Highest address of the stack
    pub const fn top(&self) -> usize {
        self.top
    }

    /// Lowest address the engine's native recursion may reach
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Total raw extent in bytes, guard included
    pub const fn extent(&self) -> usize {
        self.top - self.bottom
    }

    /// Usable depth in bytes, guard excluded
    pub const fn usable(&self) -> usize {
        self.top - self.limit
    }

    fn overlaps(&self, heap: &HeapRegion) -> bool {
        self.bottom < heap.end() && heap.start() < self.top
    }
}

/// The allocator's arena, delimited by addresses. Configured once,
/// immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapRegion {
    start: usize,
    end: usize,
}

impl HeapRegion {
    /// Builds a heap region from its address range.
    ///
    /// An inverted range is clamped to empty; [`MemoryLayout::new`] rejects
    /// empty regions as a precondition violation.
    pub const fn new(start: usize, end: usize) -> Self {
        let end = if end < start { start } else { end };
        Self { start, end }
    }

    /// First address of the arena
    pub const fn start(&self) -> usize {
        self.start
    }

    /// One past the last address of the arena
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Arena size in bytes
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// True for a zero-length region
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if `addr` falls inside the arena
    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// The validated pair of stack and heap regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    stack: StackRegion,
    heap: HeapRegion,
}

impl MemoryLayout {
    /// Validates that the heap is non-empty and disjoint from the stack
    pub fn new(stack: StackRegion, heap: HeapRegion) -> Result<Self, LayoutError> {
        if heap.is_empty() {
            return Err(LayoutError::EmptyHeap);
        }
        if stack.overlaps(&heap) {
            return Err(LayoutError::Overlap);
        }
        Ok(Self { stack, heap })
    }

    /// The stack region
    pub const fn stack(&self) -> StackRegion {
        self.stack
    }

    /// The heap region
    pub const fn heap(&self) -> HeapRegion {
        self.heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_sits_guard_margin_above_bottom() {
        let stack = StackRegion::from_raw(0x9000, 0x8000, 1024).unwrap();
        assert_eq!(stack.top(), 0x9000);
        assert_eq!(stack.limit(), 0x8000 + 1024);
        assert_eq!(stack.extent(), 0x1000);
        assert_eq!(stack.usable(), 0x1000 - 1024);
        assert!(stack.limit() < stack.top());
    }

    #[test]
    fn test_guard_margin_must_leave_usable_stack() {
        assert_eq!(
            StackRegion::from_raw(0x9000, 0x8000, 0x1000),
            Err(LayoutError::GuardExhaustsStack {
                guard: 0x1000,
                extent: 0x1000
            })
        );
        assert_eq!(
            StackRegion::from_raw(0x9000, 0x8000, 0x2000),
            Err(LayoutError::GuardExhaustsStack {
                guard: 0x2000,
                extent: 0x1000
            })
        );
        // Inverted extents are rejected outright
        assert!(StackRegion::from_raw(0x8000, 0x9000, 0).is_err());
    }

    #[inline(never)]
    fn callee_frame_addr() -> usize {
        let probe = 0u8;
        core::ptr::addr_of!(probe) as usize
    }

    #[test]
    fn test_capture_anchors_above_later_frames() {
        let stack = StackRegion::capture(64 * 1024, DEFAULT_GUARD_MARGIN).unwrap();
        assert!(stack.limit() < stack.top());
        assert_eq!(stack.extent(), 64 * 1024);
        // Frames of functions called after the capture sit below the top
        assert!(callee_frame_addr() < stack.top());
    }

    #[test]
    fn test_heap_region_bounds() {
        let heap = HeapRegion::new(0x2000, 0x3000);
        assert_eq!(heap.len(), 0x1000);
        assert!(heap.contains(0x2000));
        assert!(heap.contains(0x2fff));
        assert!(!heap.contains(0x3000));
        assert!(!heap.is_empty());
        // Inverted ranges clamp to empty
        assert!(HeapRegion::new(0x3000, 0x2000).is_empty());
        assert_eq!(HeapRegion::new(0x3000, 0x2000).len(), 0);
    }

    #[test]
    fn test_empty_heap_is_rejected() {
        let stack = StackRegion::from_raw(0x9000, 0x8000, 64).unwrap();
        assert_eq!(
            MemoryLayout::new(stack, HeapRegion::new(0x3000, 0x3000)),
            Err(LayoutError::EmptyHeap)
        );
    }

    #[test]
    fn test_overlapping_regions_are_rejected() {
        let stack = StackRegion::from_raw(0x9000, 0x8000, 64).unwrap();

        let inside = HeapRegion::new(0x8800, 0x8900);
        assert_eq!(MemoryLayout::new(stack, inside), Err(LayoutError::Overlap));

        let straddling = HeapRegion::new(0x7000, 0x8100);
        assert_eq!(
            MemoryLayout::new(stack, straddling),
            Err(LayoutError::Overlap)
        );

        // Overlap with the guard span counts too: scanning soundness depends
        // on the full raw extents being disjoint
        let in_guard = HeapRegion::new(0x8000, 0x8040);
        assert_eq!(MemoryLayout::new(stack, in_guard), Err(LayoutError::Overlap));
    }

    #[test]
    fn test_disjoint_regions_are_accepted() {
        let stack = StackRegion::from_raw(0x9000, 0x8000, 64).unwrap();
        let heap = HeapRegion::new(0x2000, 0x8000);
        let layout = MemoryLayout::new(stack, heap).unwrap();
        assert_eq!(layout.stack(), stack);
        assert_eq!(layout.heap(), heap);
    }
}
