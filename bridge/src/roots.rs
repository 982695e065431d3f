//! Conservative root capture.
//!
//! The allocator has no type information about the native frames above it,
//! so a collection starts by capturing everything that *could* hold a
//! reference: the general-purpose register file and the live stack span.
//! This module is the one unsafe boundary of the crate; everything above it
//! consumes the captured [`RootSet`] through safe iteration.
//!
//! The register flush is the safety-critical step. A reference freshly
//! produced by the engine may exist only in a register, not yet in any
//! stack slot; skipping the flush would let the collector reclaim the
//! object it points to while the mutator still holds it. Only callee-saved
//! registers need spilling - at this call boundary the ABI has already
//! forced every live caller-saved value into some frame inside the span.
//!
//! The stack pointer is sampled *after* the flush so the flush's own frame,
//! snapshot array included, lands inside the scanned span.

use core::mem::size_of;

const WORD: usize = size_of::<usize>();

/// Upper bound on spilled registers across supported targets.
pub const MAX_REGS: usize = 16;

/// One collection's reachability starting points: the register snapshot
/// plus the live span `[sp, top)`.
///
/// Ephemeral by design - produced fresh for each collection and never
/// persisted across one, because both the registers and the span go stale
/// the moment the mutator resumes.
#[derive(Debug, Clone, Copy)]
pub struct RootSet {
    regs: [usize; MAX_REGS],
    reg_count: usize,
    sp: usize,
    top: usize,
}

impl RootSet {
    /// Root set over an explicit word list, with an empty stack span.
    ///
    /// For references pinned outside any scanned frame (static state, or
    /// deterministic tests). Words beyond [`MAX_REGS`] are ignored.
    pub fn from_words(words: &[usize]) -> Self {
        let mut regs = [0usize; MAX_REGS];
        let reg_count = words.len().min(MAX_REGS);
        regs[..reg_count].copy_from_slice(&words[..reg_count]);
        Self {
            regs,
            reg_count,
            sp: 0,
            top: 0,
        }
    }

    /// The captured stack pointer (inclusive scan start)
    pub const fn sp(&self) -> usize {
        self.sp
    }

    /// The configured stack top (exclusive scan end)
    pub const fn top(&self) -> usize {
        self.top
    }

    /// The register snapshot
    pub fn register_words(&self) -> &[usize] {
        &self.regs[..self.reg_count]
    }

    /// Number of word-aligned slots in the live span
    pub const fn span_words(&self) -> usize {
        (self.top - self.sp) / WORD
    }

    /// Visits every candidate pointer: each snapshot register, then each
    /// word-aligned slot of the live span.
    ///
    /// Values are handed over verbatim; deciding which of them reference
    /// live allocations is the arena's job.
    pub fn for_each_candidate<F: FnMut(usize)>(&self, mut visit: F) {
        for &word in self.register_words() {
            visit(word);
        }
        let mut addr = self.sp;
        while addr + WORD <= self.top {
            // In-bounds by construction: `capture` aligned sp upward and top
            // downward, and the span is this thread's own live stack.
            let word = unsafe { core::ptr::read_volatile(addr as *const usize) };
            visit(word);
            addr += WORD;
        }
    }
}

/// Captures the register file and the live stack span up to `top`.
///
/// `top` is the stack top recorded at configuration time
/// ([`StackRegion::top`](crate::layout::StackRegion::top)); it must lie at
/// or above every frame that may hold arena references. Must run on the
/// mutator's own thread - the whole point is that the mutator is parked
/// inside this very call chain while its registers are sampled.
pub fn capture(top: usize) -> RootSet {
    let mut regs = [0usize; MAX_REGS];
    let (reg_count, sp) = flush_registers(&mut regs);
    // Word-align inward so every read in the span is aligned
    let sp = (sp + WORD - 1) & !(WORD - 1);
    let top = top & !(WORD - 1);
    RootSet {
        regs,
        reg_count,
        sp: sp.min(top),
        top,
    }
}

/// Spills the callee-saved registers into `out` and returns
/// `(count, stack pointer)`, with the stack pointer sampled after the
/// spill.
#[cfg(target_arch = "x86_64")]
#[inline(never)]
fn flush_registers(out: &mut [usize; MAX_REGS]) -> (usize, usize) {
    let sp: usize;
    unsafe {
        core::arch::asm!(
            "mov [{out}], rbx",
            "mov [{out} + 8], rbp",
            "mov [{out} + 16], r12",
            "mov [{out} + 24], r13",
            "mov [{out} + 32], r14",
            "mov [{out} + 40], r15",
            "mov {sp}, rsp",
            out = in(reg) out.as_mut_ptr(),
            sp = out(reg) sp,
            options(nostack)
        );
    }
    (6, sp)
}

#[cfg(target_arch = "aarch64")]
#[inline(never)]
fn flush_registers(out: &mut [usize; MAX_REGS]) -> (usize, usize) {
    let sp: usize;
    unsafe {
        core::arch::asm!(
            "stp x19, x20, [{out}]",
            "stp x21, x22, [{out}, #16]",
            "stp x23, x24, [{out}, #32]",
            "stp x25, x26, [{out}, #48]",
            "stp x27, x28, [{out}, #64]",
            "str x29, [{out}, #80]",
            "mov {sp}, sp",
            out = in(reg) out.as_mut_ptr(),
            sp = out(reg) sp,
            options(nostack)
        );
    }
    (11, sp)
}

/// Degraded capture for targets without a spill sequence: empty register
/// snapshot, span starting at this frame. Conservative scanning still
/// covers the stack, but a reference living only in a register can be
/// missed - ports to new targets must add a real spill.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(never)]
fn flush_registers(out: &mut [usize; MAX_REGS]) -> (usize, usize) {
    let _ = out;
    let anchor = 0usize;
    (0, core::ptr::addr_of!(anchor) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_top() -> usize {
        let anchor = 0u8;
        core::ptr::addr_of!(anchor) as usize
    }

    #[test]
    fn test_capture_orders_and_aligns_the_span() {
        let top = current_top();
        let roots = capture(top);

        assert!(roots.sp() <= roots.top());
        assert_eq!(roots.sp() % WORD, 0);
        assert_eq!(roots.top() % WORD, 0);
        assert!(roots.top() <= top);
        // The capture machinery itself occupies at least a frame or two
        assert!(roots.span_words() > 0);
    }

    #[test]
    fn test_register_snapshot_is_bounded() {
        let roots = capture(current_top());
        assert!(roots.register_words().len() <= MAX_REGS);
    }

    #[test]
    fn test_explicit_root_set_has_no_span() {
        let roots = RootSet::from_words(&[0xA0, 0xB0, 0xC0]);
        assert_eq!(roots.span_words(), 0);
        let mut seen = Vec::new();
        roots.for_each_candidate(|w| seen.push(w));
        assert_eq!(seen, vec![0xA0, 0xB0, 0xC0]);
    }

    #[inline(never)]
    fn scan_finds(top: usize, needle: usize) -> bool {
        // Held across the capture call, so it must survive in a
        // callee-saved register or a frame slot - either is scanned
        let live = core::hint::black_box(needle);
        let roots = capture(top);
        let mut found = false;
        roots.for_each_candidate(|w| {
            if w == live {
                found = true;
            }
        });
        core::hint::black_box(live);
        found
    }

    #[test]
    fn test_live_local_word_is_visible_to_the_scan() {
        let top = current_top();
        let needle = core::hint::black_box(0x5EED_CAFEusize);
        assert!(scan_finds(top, needle));
    }

    #[test]
    fn test_candidate_count_matches_snapshot_plus_span() {
        let roots = capture(current_top());
        let mut count = 0usize;
        roots.for_each_candidate(|_| count += 1);
        assert_eq!(count, roots.register_words().len() + roots.span_words());
    }
}
