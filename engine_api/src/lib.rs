//! # Engine API
//!
//! The narrow boundary between the embedding bridge and the external
//! language engine.
//!
//! ## Philosophy
//!
//! **The engine is a collaborator, not a component.**
//!
//! The bytecode compiler, object model, line editing and lexer semantics all
//! live on the far side of this boundary. The bridge consumes the engine
//! through two narrow calls - initialize and run-one-cycle - and supplies it
//! with an equally narrow set of services: character I/O, arena allocation,
//! timing, and filesystem stubs that unconditionally report "no such entry".
//!
//! ## Error tiers
//!
//! Recoverable engine errors (a syntax error typed at the prompt, a soft
//! out-of-memory resolved by a collection) never cross this boundary: the
//! engine reports them as text through [`EngineServices`] and keeps going.
//! Only the unrecoverable tier - [`EngineFault`] - is returned upward, and
//! the bridge answers it by halting permanently.

#![cfg_attr(not(test), no_std)]

pub mod engine;
pub mod services;

pub use engine::{CycleOutcome, EngineFault, LanguageEngine};
pub use services::{AllocError, EngineServices, FileError, ImportStat, ObjRef};
