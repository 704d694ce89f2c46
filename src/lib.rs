//! ensayo: dynamic test harness for declarative infrastructure modules.
//!
//! Reads a module's `variable` and `output` declarations without running it,
//! synthesizes the inputs it needs, then applies it, checks every output
//! resolves to something, and destroys it.

pub mod cli;
pub mod core;
pub mod provenance;
pub mod provision;
pub mod workspace;
