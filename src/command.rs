//! Command execution and orchestration.
//!
//! One module per CLI subcommand. Each module exposes an `execute` function
//! that wires configuration, the git handle, and the forge client together
//! for that command's slice of the pipeline.
pub mod build;
pub mod check;
pub mod release;
pub mod rename;
