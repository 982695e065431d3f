//! Lifecycle manager.
//!
//! Sequences one bridge invocation: bind the channel, configure stack and
//! heap, initialize the engine, drive the interactive loop, deinitialize,
//! return. The entry point is re-enterable - it hands a status word back to
//! the host instead of terminating anything - and every unrecoverable path
//! funnels into the halt strategy instead of returning.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU8, Ordering};

use engine_api::{CycleOutcome, EngineFault, EngineServices, LanguageEngine};
use host_channel::{HostArgs, HostChannel};
use serde::{Deserialize, Serialize};

use crate::context::BridgeContext;
use crate::fatal::{FatalFault, HaltStrategy};
use crate::heap::Heap;
use crate::layout::{MemoryLayout, StackRegion};

/// The status word the entry point hands back on the normal path.
///
/// It is also the only status the normal path can produce; everything else
/// halts instead of returning.
pub const STATUS_SUCCESS: u32 = 0;

/// Default arena size when the embedder expresses no preference.
pub const DEFAULT_HEAP_BYTES: usize = 64 * 1024;

/// Where one bridge invocation currently stands.
///
/// `Halted` is terminal: no further heap, stack or channel mutation happens
/// past it. `Returned` means the entry point gave control back and may be
/// re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgePhase {
    /// No invocation in progress
    Unbound,
    /// Channel bound, layout validated
    Configured,
    /// Interactive loop in progress
    Running,
    /// Unrecoverable fault; spinning until external reset
    Halted,
    /// Normal completion; re-enterable
    Returned,
}

impl BridgePhase {
    const fn as_u8(self) -> u8 {
        match self {
            BridgePhase::Unbound => 0,
            BridgePhase::Configured => 1,
            BridgePhase::Running => 2,
            BridgePhase::Halted => 3,
            BridgePhase::Returned => 4,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => BridgePhase::Unbound,
            1 => BridgePhase::Configured,
            2 => BridgePhase::Running,
            4 => BridgePhase::Returned,
            _ => BridgePhase::Halted,
        }
    }
}

/// Cloneable observer of the bridge phase.
///
/// Cheap to clone and safe to read from another thread - the one mechanism
/// an external watchdog has for telling a halted bridge from a live one,
/// since the halted bridge itself will never speak again.
#[derive(Debug, Clone)]
pub struct PhaseHandle {
    shared: Arc<AtomicU8>,
}

impl PhaseHandle {
    fn new() -> Self {
        Self {
            shared: Arc::new(AtomicU8::new(BridgePhase::Unbound.as_u8())),
        }
    }

    /// The current phase
    pub fn get(&self) -> BridgePhase {
        BridgePhase::from_u8(self.shared.load(Ordering::SeqCst))
    }

    /// True once the bridge has entered its terminal state
    pub fn is_halted(&self) -> bool {
        matches!(self.get(), BridgePhase::Halted)
    }

    fn set(&self, phase: BridgePhase) {
        self.shared.store(phase.as_u8(), Ordering::SeqCst);
    }
}

/// How the interactive loop is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplMode {
    /// The bridge reads one character at a time and feeds the engine's
    /// statement accumulator; the host could interleave work between
    /// characters
    CharDriven,
    /// The engine blocks on reads itself until a full statement arrives;
    /// simpler when the host has nothing else to do
    BlockOnLine,
}

/// Per-invocation configuration.
///
/// The stack region is captured by the embedder in its own outermost frame
/// (see [`StackRegion::capture`]) so that every engine frame lies inside
/// the scanned span.
#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig {
    /// The validated native stack extents
    pub stack: StackRegion,
    /// Arena size in bytes
    pub heap_bytes: usize,
    /// Loop shape
    pub mode: ReplMode,
}

impl BridgeConfig {
    /// Configuration with the default arena and char-driven loop
    pub fn new(stack: StackRegion) -> Self {
        Self {
            stack,
            heap_bytes: DEFAULT_HEAP_BYTES,
            mode: ReplMode::CharDriven,
        }
    }

    /// Overrides the arena size
    pub fn with_heap_bytes(mut self, bytes: usize) -> Self {
        self.heap_bytes = bytes;
        self
    }

    /// Overrides the loop shape
    pub fn with_mode(mut self, mode: ReplMode) -> Self {
        self.mode = mode;
        self
    }
}

/// One bridge instance: a bound channel plus a halt strategy.
///
/// The channel is bound exactly once, at construction, and stays borrowed
/// for the bridge's lifetime - rebinding mid-invocation is impossible by
/// construction, which is what makes the entry point safely re-enterable.
pub struct Bridge<'c, C: HostChannel + ?Sized, H: HaltStrategy> {
    channel: &'c mut C,
    halt: H,
    phase: PhaseHandle,
}

impl<'c, C: HostChannel + ?Sized, H: HaltStrategy> Bridge<'c, C, H> {
    /// Binds the host channel and halt strategy
    pub fn new(channel: &'c mut C, halt: H) -> Self {
        Self {
            channel,
            halt,
            phase: PhaseHandle::new(),
        }
    }

    /// The current phase
    pub fn phase(&self) -> BridgePhase {
        self.phase.get()
    }

    /// A cloneable phase observer for watchdogs and tests
    pub fn phase_handle(&self) -> PhaseHandle {
        self.phase.clone()
    }

    /// The entry point: one full invocation.
    ///
    /// Returns [`STATUS_SUCCESS`] on the normal path. On an unrecoverable
    /// fault it does not return at all: the phase becomes
    /// [`BridgePhase::Halted`] and control passes to the halt strategy,
    /// after at most one best-effort diagnostic write.
    ///
    /// `args` carries the four host-defined words from the entry call;
    /// they are reserved for host-specific parameters and ignored here.
    pub fn run(
        &mut self,
        engine: &mut dyn LanguageEngine,
        config: &BridgeConfig,
        args: HostArgs,
    ) -> u32 {
        let _ = args;
        let fault = match Self::run_to_completion(self.channel, &self.phase, engine, config) {
            Ok(status) => return status,
            Err(fault) => fault,
        };
        self.phase.set(BridgePhase::Halted);
        self.halt.halt(fault)
    }

    fn run_to_completion(
        channel: &mut C,
        phase: &PhaseHandle,
        engine: &mut dyn LanguageEngine,
        config: &BridgeConfig,
    ) -> Result<u32, FatalFault> {
        let heap = Heap::with_capacity(config.heap_bytes);
        // Violated preconditions make later scanning unsound; fail fast
        MemoryLayout::new(config.stack, heap.region()).map_err(|_| FatalFault::Fault)?;
        phase.set(BridgePhase::Configured);

        let mut ctx = BridgeContext::new(channel, heap, config.stack);
        engine
            .init(&mut ctx)
            .map_err(|fault| Self::escalate(&mut ctx, fault))?;
        phase.set(BridgePhase::Running);

        let outcome = match config.mode {
            ReplMode::CharDriven => Self::drive_chars(engine, &mut ctx),
            ReplMode::BlockOnLine => engine.run_repl(&mut ctx),
        };

        match outcome {
            Ok(()) => {
                engine.deinit();
                phase.set(BridgePhase::Returned);
                Ok(STATUS_SUCCESS)
            }
            Err(fault) => Err(Self::escalate(&mut ctx, fault)),
        }
    }

    /// Turns an engine fault terminal, emitting the one best-effort
    /// diagnostic where the fault class has one.
    fn escalate(ctx: &mut BridgeContext<'_, C>, fault: EngineFault) -> FatalFault {
        let fatal = FatalFault::from(fault);
        if let Some(diagnostic) = fatal.diagnostic() {
            ctx.console_mut().write_all(diagnostic);
        }
        fatal
    }

    fn drive_chars(
        engine: &mut dyn LanguageEngine,
        ctx: &mut BridgeContext<'_, C>,
    ) -> Result<(), EngineFault> {
        loop {
            let byte = ctx.read_char()?;
            if let CycleOutcome::ExitRequested = engine.process_char(ctx, byte)? {
                return Ok(());
            }
        }
    }
}
