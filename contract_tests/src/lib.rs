//! # Bridge Contract Tests
//!
//! This crate provides "golden" tests for the bridge's observable contracts
//! to ensure they don't drift accidentally over time.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: the host channel contract and the lifecycle
//!   are written down as executable assertions
//! - **Testability first**: every contract runs against the simulated host,
//!   end to end, under `cargo test`
//! - **Mechanism not policy**: define what must stay stable (call shapes,
//!   phases, fault behavior), not how embedders should use it
//!
//! ## Structure
//!
//! - `channel_contract`: the five-operation host table's normal-path rules
//! - `session`: full interactive sessions through the lifecycle manager
//! - `collector`: observable guarantees of the conservative collector
//! - `halting`: the fatal tier - phases, diagnostics, and the no-return rule

pub mod channel_contract;
pub mod collector;
pub mod halting;
pub mod session;

/// Common helpers for driving full bridge sessions against the simulated
/// host.
pub mod test_helpers {
    use bridge::{Bridge, BridgeConfig, BridgePhase, FatalFault, HaltStrategy, StackRegion};
    use host_channel::HostArgs;
    use sim_host::{CalcEngine, SimChannel};
    use std::sync::{Arc, Mutex};

    /// Halt strategy that records the fault and unwinds its thread, so a
    /// faulting session fails the test instead of spinning forever.
    pub struct PanicHalt {
        seen: Arc<Mutex<Option<FatalFault>>>,
    }

    impl PanicHalt {
        pub fn new() -> (Self, Arc<Mutex<Option<FatalFault>>>) {
            let seen = Arc::new(Mutex::new(None));
            (Self { seen: seen.clone() }, seen)
        }
    }

    impl HaltStrategy for PanicHalt {
        fn halt(&mut self, fault: FatalFault) -> ! {
            *self.seen.lock().unwrap() = Some(fault);
            panic!("bridge halted: {fault}");
        }
    }

    /// Everything observable after one session attempt.
    pub struct SessionReport {
        /// Entry-point status, if the run returned at all
        pub status: Option<u32>,
        /// Console output accumulated by the simulated host
        pub output: String,
        /// Final phase as seen through the phase handle
        pub phase: BridgePhase,
        /// The fault handed to the halt strategy, if any
        pub fault: Option<FatalFault>,
    }

    /// Runs one calculator session on its own thread and reports the
    /// outcome, whether the run returned or halted.
    pub fn run_calc_session(script: &[u8], heap_bytes: usize) -> SessionReport {
        run_calc_session_with(script, heap_bytes, bridge::ReplMode::CharDriven)
    }

    /// Like [`run_calc_session`], with an explicit loop shape.
    pub fn run_calc_session_with(
        script: &[u8],
        heap_bytes: usize,
        mode: bridge::ReplMode,
    ) -> SessionReport {
        let mut channel = SimChannel::new(script);
        let tap = channel.output_tap();
        let (halt, seen) = PanicHalt::new();

        let phase_slot: Arc<Mutex<Option<bridge::PhaseHandle>>> = Arc::new(Mutex::new(None));
        let thread_slot = phase_slot.clone();
        let worker = std::thread::spawn(move || {
            let stack = StackRegion::capture(64 * 1024, bridge::DEFAULT_GUARD_MARGIN)
                .unwrap();
            let mut engine = CalcEngine::new();
            let mut bridge = Bridge::new(&mut channel, halt);
            *thread_slot.lock().unwrap() = Some(bridge.phase_handle());
            let config = BridgeConfig::new(stack)
                .with_heap_bytes(heap_bytes)
                .with_mode(mode);
            bridge.run(&mut engine, &config, HostArgs::none())
        });

        let status = worker.join().ok();
        let phase = phase_slot
            .lock()
            .unwrap()
            .clone()
            .map(|handle| handle.get())
            .unwrap_or(BridgePhase::Unbound);
        let fault = *seen.lock().unwrap();
        SessionReport {
            status,
            output: tap.text(),
            phase,
            fault,
        }
    }
}
