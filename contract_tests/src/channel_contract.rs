//! Normal-path rules of the five-operation host table.
//!
//! These pin the contract every conforming host must honor, exercised
//! against the simulated host as the reference implementation.
