//! Process exit codes and machine-readable errors for the binary.

use serde::Serialize;

/// Exit codes of the `fileorg` binary.
///
/// - 0: Success
/// - 1: General error
/// - 2: Nothing found (no duplicates, nothing to undo)
/// - 3: Partial success (completed, but some entries were skipped or failed)
/// - 130: Interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Completed, but there was nothing to report or act on.
    NothingFound = 2,
    /// Completed with soft errors.
    PartialSuccess = 3,
    /// Stopped by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "FO000",
            Self::GeneralError => "FO001",
            Self::NothingFound => "FO002",
            Self::PartialSuccess => "FO003",
            Self::Interrupted => "FO130",
        }
    }

    /// Exit code for an error returned by the command layer.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<Interrupted>().is_some() {
            Self::Interrupted
        } else {
            Self::GeneralError
        }
    }
}

/// Returned by commands that stopped because shutdown was requested.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("interrupted by user")]
pub struct Interrupted;

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "FO001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the command was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
