//! CLI error types with miette diagnostics.
//!
//! Structured run failures keep their full context chain and exit with
//! a dedicated code; anything else is a general failure.

use miette::Diagnostic;
use thiserror::Error;

use sitereg_core::CoreError;

/// Exit codes for process termination.
pub mod exit_code {
    /// A run failure the tool understands: rendered as an error tree.
    pub const STRUCTURED: i32 = 2;
    /// Everything else.
    pub const GENERAL: i32 = 1;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(dead_code)]
pub enum CliError {
    /// Structured engine failure, rendered as an indented context tree.
    #[error(transparent)]
    Run(#[from] CoreError),

    /// Failure outside the engine's error model.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Run(_) => exit_code::STRUCTURED,
            Self::Io(_) => exit_code::GENERAL,
        }
    }
}
