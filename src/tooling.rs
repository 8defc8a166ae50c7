//! Tooling & Integration Layer
//!
//! Command-line entry points and their text formatting.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
