//! Exit codes and structured error output.

use serde::Serialize;

use crate::dedup::DedupError;
use crate::scanner::ScanError;

/// Process exit codes.
///
/// - 0: Success
/// - 1: General error (catalog, link or I/O failure, existing cache, ...)
/// - 2: Usage error (reported by clap before `run_app` runs)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: every requested step completed.
    Success = 0,
    /// General error: a step failed.
    GeneralError = 1,
    /// Usage error: invalid command line.
    Usage = 2,
    /// Interrupted: cancelled by the user; committed work is kept.
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
            Self::Success => "RD000",
            Self::GeneralError => "RD001",
            Self::Usage => "RD002",
            Self::Interrupted => "RD130",
        }
    }

    /// Classify an error returned by [`run_app`](crate::run_app).
    ///
    /// Interrupted scans and dedup runs map to [`ExitCode::Interrupted`],
    /// wherever they sit in the context chain.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        let interrupted = err.chain().any(|cause| {
            cause
                .downcast_ref::<ScanError>()
                .is_some_and(|e| matches!(e, ScanError::Interrupted))
                || cause
                    .downcast_ref::<DedupError>()
                    .is_some_and(|e| matches!(e, DedupError::Interrupted))
        });
        if interrupted {
            Self::Interrupted
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "RD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
