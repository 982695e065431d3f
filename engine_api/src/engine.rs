//! The two-call engine surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::EngineServices;

/// Outcome of feeding one character to the engine's statement accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    /// Keep feeding characters
    Continue,
    /// The engine asked to leave the interactive loop
    ExitRequested,
}

/// The unrecoverable tier of engine errors.
///
/// Anything the engine can recover from - syntax errors, soft out-of-memory
/// - stays on its side of the boundary and is reported as text. A value of
/// this type means the bridge must halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EngineFault {
    /// The engine's own error-propagation mechanism failed: an error was
    /// raised while no handler context existed to receive it
    #[error("error propagation failed")]
    PropagationFailure,

    /// Unrecoverable condition with no defined recovery
    #[error("unrecoverable engine fault")]
    Fault,
}

/// A language engine, consumed through two narrow calls.
///
/// The bridge sequences `init` once, then either drives
/// [`process_char`](LanguageEngine::process_char) a character at a time
/// (letting the host interleave other work between characters) or hands the
/// whole loop to [`run_repl`](LanguageEngine::run_repl), then calls `deinit`
/// exactly once on the normal path. Both loop shapes are functionally
/// equivalent.
pub trait LanguageEngine {
    /// Initializes the engine against the already-configured arena
    fn init(&mut self, services: &mut dyn EngineServices) -> Result<(), EngineFault>;

    /// Feeds one character to the engine's incremental statement
    /// accumulator
    fn process_char(
        &mut self,
        services: &mut dyn EngineServices,
        byte: u8,
    ) -> Result<CycleOutcome, EngineFault>;

    /// Runs the interactive loop, blocking on reads until exit.
    ///
    /// The default implementation drives
    /// [`process_char`](LanguageEngine::process_char) from blocking
    /// single-character reads; engines with their own line handling may
    /// replace it.
    fn run_repl(&mut self, services: &mut dyn EngineServices) -> Result<(), EngineFault> {
        loop {
            let byte = services.read_char()?;
            if let CycleOutcome::ExitRequested = self.process_char(services, byte)? {
                return Ok(());
            }
        }
    }

    /// Releases engine-held resources deterministically
    fn deinit(&mut self) {}
}
