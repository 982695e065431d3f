//! Observable guarantees of the conservative collector.
//!
//! Pinned at two levels: directly against the arena with explicit roots
//! (deterministic), and through whole sessions on a deliberately tiny arena
//! (the end-to-end reclamation guarantee the interactive loop depends on).
