//! Conservative mark-and-sweep arena.
//!
//! Fixed-width blocks with a side state table: `Head` starts an allocation,
//! `Tail` continues it. The table lives outside the arena, so reading and
//! writing payloads is ordinary slice indexing - the only raw memory
//! interpretation in the crate stays in [`crate::roots`].
//!
//! A candidate word is a root when it lands inside the arena, on a block
//! boundary, on a live head. That test over-approximates - a stale integer
//! with the right bit pattern retains a dead object - but never
//! under-approximates, which is the property everything else here depends
//! on. Marking then re-scans each retained payload the same way, so
//! object-to-object references need no layout metadata either.
//!
//! Collections are stop-the-world by construction: mutator and collector
//! share the single thread, and a collection runs only inside a failed
//! allocation.

use alloc::vec;
use alloc::vec::Vec;

use engine_api::{AllocError, ObjRef};

use crate::layout::HeapRegion;
use crate::roots::RootSet;

/// Machine word size; the scan granularity
pub const WORD: usize = core::mem::size_of::<usize>();

/// Words per arena block
pub const BLOCK_WORDS: usize = 4;

/// Bytes per arena block; also the allocation granularity
pub const BLOCK_BYTES: usize = BLOCK_WORDS * WORD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    /// Available for allocation
    Free,
    /// Continuation of the preceding head's run
    Tail,
    /// First block of a live allocation
    Head,
    /// Head reached by the current mark phase
    HeadMarked,
}

/// Running allocator counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Successful allocations since construction
    pub alloc_count: usize,
    /// Completed collection epochs
    pub collections: usize,
    /// Objects retained by the most recent collection
    pub last_marked: usize,
    /// Objects reclaimed by the most recent collection
    pub last_freed: usize,
}

/// Outcome of one collection epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    /// Objects retained
    pub marked: usize,
    /// Objects reclaimed
    pub freed: usize,
}

/// The arena allocator the engine draws from.
pub struct Heap {
    arena: Vec<u8>,
    /// Offset of the first word-aligned byte inside `arena`
    base_off: usize,
    blocks: usize,
    table: Vec<BlockState>,
    lens: Vec<usize>,
    stats: HeapStats,
}

impl Heap {
    /// Builds an arena of at least one block, rounding `bytes` down to
    /// whole blocks.
    ///
    /// The backing store never moves or grows after construction; the
    /// region reported by [`region`](Heap::region) stays valid for the
    /// heap's lifetime.
    pub fn with_capacity(bytes: usize) -> Self {
        let blocks = (bytes / BLOCK_BYTES).max(1);
        // Over-allocate one word so the block base can be word-aligned
        let arena = vec![0u8; blocks * BLOCK_BYTES + WORD];
        let base_off = (arena.as_ptr() as usize).wrapping_neg() % WORD;
        Self {
            arena,
            base_off,
            blocks,
            table: vec![BlockState::Free; blocks],
            lens: vec![0; blocks],
            stats: HeapStats::default(),
        }
    }

    /// Address of the first block
    pub fn base(&self) -> usize {
        self.arena.as_ptr() as usize + self.base_off
    }

    /// Total arena size in bytes
    pub const fn size(&self) -> usize {
        self.blocks * BLOCK_BYTES
    }

    /// The arena's address range
    pub fn region(&self) -> HeapRegion {
        HeapRegion::new(self.base(), self.base() + self.size())
    }

    /// Allocator counters
    pub const fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Blocks currently available
    pub fn free_blocks(&self) -> usize {
        self.table
            .iter()
            .filter(|state| matches!(state, BlockState::Free))
            .count()
    }

    /// Live allocations
    pub fn live_objects(&self) -> usize {
        self.table
            .iter()
            .filter(|state| matches!(state, BlockState::Head | BlockState::HeadMarked))
            .count()
    }

    /// True if `addr` falls inside the arena
    pub fn contains(&self, addr: usize) -> bool {
        self.region().contains(addr)
    }

    /// True while `obj` references a live allocation head
    pub fn is_live(&self, obj: ObjRef) -> bool {
        self.head_block(obj.addr()).is_some()
    }

    /// Shared view of a live object's payload
    pub fn payload(&self, obj: ObjRef) -> Option<&[u8]> {
        let head = self.head_block(obj.addr())?;
        let start = self.base_off + head * BLOCK_BYTES;
        Some(&self.arena[start..start + self.lens[head]])
    }

    /// Mutable view of a live object's payload
    pub fn payload_mut(&mut self, obj: ObjRef) -> Option<&mut [u8]> {
        let head = self.head_block(obj.addr())?;
        let start = self.base_off + head * BLOCK_BYTES;
        let len = self.lens[head];
        Some(&mut self.arena[start..start + len])
    }

    /// Allocates `len` bytes, zero-initialized, by first fit.
    ///
    /// Does not collect on its own; the caller owns the
    /// collect-once-then-retry policy so that root capture happens in the
    /// right frame.
    pub fn alloc_bytes(&mut self, len: usize) -> Result<ObjRef, AllocError> {
        let need = Self::blocks_for(len);
        let mut run_start = 0usize;
        let mut run_len = 0usize;
        for i in 0..self.blocks {
            if matches!(self.table[i], BlockState::Free) {
                if run_len == 0 {
                    run_start = i;
                }
                run_len += 1;
                if run_len == need {
                    return Ok(self.commit(run_start, need, len));
                }
            } else {
                run_len = 0;
            }
        }
        Err(AllocError::Exhausted(len))
    }

    /// One stop-the-world collection epoch over the given roots.
    pub fn collect(&mut self, roots: &RootSet) -> CollectStats {
        let mut work: Vec<usize> = Vec::new();
        let mut marked = 0usize;
        roots.for_each_candidate(|word| marked += self.mark_candidate(word, &mut work));
        marked += self.trace(&mut work);
        let freed = self.sweep();
        self.stats.collections += 1;
        self.stats.last_marked = marked;
        self.stats.last_freed = freed;
        CollectStats { marked, freed }
    }

    fn blocks_for(len: usize) -> usize {
        // A zero-length allocation still owns one block: its address must
        // be distinguishable and scannable like any other
        (len.max(1) + BLOCK_BYTES - 1) / BLOCK_BYTES
    }

    fn commit(&mut self, start: usize, need: usize, len: usize) -> ObjRef {
        self.table[start] = BlockState::Head;
        for block in start + 1..start + need {
            self.table[block] = BlockState::Tail;
        }
        self.lens[start] = len;
        // Zero the whole run: stale words from a previous tenant must not
        // look like references during later payload scans
        let first = self.base_off + start * BLOCK_BYTES;
        self.arena[first..first + need * BLOCK_BYTES].fill(0);
        self.stats.alloc_count += 1;
        ObjRef::from_addr(self.base() + start * BLOCK_BYTES)
    }

    /// Resolves `addr` to a live head block: in-arena, block-aligned,
    /// and currently allocated.
    fn head_block(&self, addr: usize) -> Option<usize> {
        let block = self.block_of(addr)?;
        match self.table[block] {
            BlockState::Head | BlockState::HeadMarked => Some(block),
            _ => None,
        }
    }

    fn block_of(&self, addr: usize) -> Option<usize> {
        let base = self.base();
        if addr < base || addr >= base + self.size() {
            return None;
        }
        let off = addr - base;
        if off % BLOCK_BYTES != 0 {
            return None;
        }
        Some(off / BLOCK_BYTES)
    }

    /// Marks `word` if it is an unmarked live head; returns 1 when newly
    /// marked.
    fn mark_candidate(&mut self, word: usize, work: &mut Vec<usize>) -> usize {
        if let Some(block) = self.block_of(word) {
            if matches!(self.table[block], BlockState::Head) {
                self.table[block] = BlockState::HeadMarked;
                work.push(block);
                return 1;
            }
        }
        0
    }

    /// Transitively marks everything reachable from the worklist, scanning
    /// retained payloads word by word with the same conservative test.
    fn trace(&mut self, work: &mut Vec<usize>) -> usize {
        let mut marked = 0usize;
        let mut words: Vec<usize> = Vec::new();
        while let Some(head) = work.pop() {
            words.clear();
            let run = self.run_blocks(head);
            let start = self.base_off + head * BLOCK_BYTES;
            let bytes = &self.arena[start..start + run * BLOCK_BYTES];
            let mut i = 0;
            while i + WORD <= bytes.len() {
                let mut word = [0u8; WORD];
                word.copy_from_slice(&bytes[i..i + WORD]);
                words.push(usize::from_ne_bytes(word));
                i += WORD;
            }
            for &word in &words {
                marked += self.mark_candidate(word, work);
            }
        }
        marked
    }

    /// Reclaims every unmarked allocation and clears the mark bits.
    fn sweep(&mut self) -> usize {
        let mut freed = 0usize;
        let mut i = 0usize;
        while i < self.blocks {
            match self.table[i] {
                BlockState::Head => {
                    let run = self.run_blocks(i);
                    for block in i..i + run {
                        self.table[block] = BlockState::Free;
                    }
                    self.lens[i] = 0;
                    freed += 1;
                    i += run;
                }
                BlockState::HeadMarked => {
                    self.table[i] = BlockState::Head;
                    i += self.run_blocks(i);
                }
                _ => i += 1,
            }
        }
        freed
    }

    fn run_blocks(&self, head: usize) -> usize {
        let mut run = 1usize;
        while head + run < self.blocks && matches!(self.table[head + run], BlockState::Tail) {
            run += 1;
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roots;

    #[test]
    fn test_alloc_returns_block_aligned_zeroed_payload() {
        let mut heap = Heap::with_capacity(1024);
        let obj = heap.alloc_bytes(10).unwrap();

        assert_eq!((obj.addr() - heap.base()) % BLOCK_BYTES, 0);
        assert!(heap.contains(obj.addr()));
        assert!(heap.is_live(obj));
        assert_eq!(heap.payload(obj).unwrap(), &[0u8; 10]);
        assert_eq!(heap.stats().alloc_count, 1);
    }

    #[test]
    fn test_zero_length_allocation_owns_one_block() {
        let mut heap = Heap::with_capacity(4 * BLOCK_BYTES);
        let obj = heap.alloc_bytes(0).unwrap();

        assert!(heap.is_live(obj));
        assert_eq!(heap.payload(obj).unwrap().len(), 0);
        assert_eq!(heap.free_blocks(), 3);
    }

    #[test]
    fn test_payload_round_trip() {
        let mut heap = Heap::with_capacity(1024);
        let obj = heap.alloc_bytes(5).unwrap();
        heap.payload_mut(obj).unwrap().copy_from_slice(b"hello");
        assert_eq!(heap.payload(obj).unwrap(), b"hello");
    }

    #[test]
    fn test_collect_keeps_rooted_and_frees_unrooted() {
        let mut heap = Heap::with_capacity(1024);
        let kept = heap.alloc_bytes(8).unwrap();
        let dropped = heap.alloc_bytes(8).unwrap();

        let stats = heap.collect(&RootSet::from_words(&[kept.addr()]));

        assert_eq!(stats, CollectStats { marked: 1, freed: 1 });
        assert!(heap.is_live(kept));
        assert!(!heap.is_live(dropped));
        assert!(heap.payload(dropped).is_none());
    }

    #[test]
    fn test_interior_and_misaligned_words_are_not_roots() {
        let mut heap = Heap::with_capacity(1024);
        // Two blocks: the second is a tail
        let obj = heap.alloc_bytes(BLOCK_BYTES + 1).unwrap();

        let misaligned = obj.addr() + WORD;
        let tail = obj.addr() + BLOCK_BYTES;
        let stats = heap.collect(&RootSet::from_words(&[misaligned, tail]));

        assert_eq!(stats.marked, 0);
        assert_eq!(stats.freed, 1);
        assert!(!heap.is_live(obj));
    }

    #[test]
    fn test_marking_traces_through_payloads() {
        let mut heap = Heap::with_capacity(1024);
        let inner = heap.alloc_bytes(8).unwrap();
        let outer = heap.alloc_bytes(WORD).unwrap();
        heap.payload_mut(outer)
            .unwrap()
            .copy_from_slice(&inner.addr().to_ne_bytes());

        let stats = heap.collect(&RootSet::from_words(&[outer.addr()]));

        assert_eq!(stats.marked, 2);
        assert_eq!(stats.freed, 0);
        assert!(heap.is_live(outer));
        assert!(heap.is_live(inner));
    }

    #[test]
    fn test_exhaustion_then_collection_then_reuse() {
        let mut heap = Heap::with_capacity(4 * BLOCK_BYTES);
        for _ in 0..4 {
            heap.alloc_bytes(1).unwrap();
        }
        assert_eq!(heap.free_blocks(), 0);
        assert_eq!(heap.alloc_bytes(1), Err(AllocError::Exhausted(1)));

        // Nothing rooted: everything is garbage
        let stats = heap.collect(&RootSet::from_words(&[]));
        assert_eq!(stats.freed, 4);
        assert_eq!(heap.free_blocks(), 4);
        assert!(heap.alloc_bytes(1).is_ok());
        assert_eq!(heap.stats().collections, 1);
        assert_eq!(heap.stats().last_freed, 4);
    }

    #[test]
    fn test_multi_block_runs_are_freed_whole() {
        let mut heap = Heap::with_capacity(8 * BLOCK_BYTES);
        let big = heap.alloc_bytes(3 * BLOCK_BYTES).unwrap();
        assert_eq!(heap.free_blocks(), 5);

        heap.collect(&RootSet::from_words(&[]));
        assert!(!heap.is_live(big));
        assert_eq!(heap.free_blocks(), 8);

        // The reclaimed run is immediately reusable as one extent
        assert!(heap.alloc_bytes(8 * BLOCK_BYTES).is_ok());
    }

    #[inline(never)]
    fn hold_across_collection(heap: &mut Heap, top: usize) {
        let obj = heap.alloc_bytes(24).unwrap();
        let keep = core::hint::black_box(obj);

        let roots = roots::capture(top);
        heap.collect(&roots);

        assert!(heap.is_live(keep));
        assert_eq!(heap.payload(keep).unwrap().len(), 24);
        core::hint::black_box(keep);
    }

    #[test]
    fn test_stack_local_reference_survives_a_real_scan() {
        let anchor = 0u8;
        let top = core::ptr::addr_of!(anchor) as usize;
        let mut heap = Heap::with_capacity(1024);
        hold_across_collection(&mut heap, top);
    }
}
