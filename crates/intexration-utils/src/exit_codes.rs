//! Exit code constants for the intexration CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CONFIG` | Invalid CLI arguments, configuration or missing resource |
//! | 4 | `NOT_FOUND` | Requested document is neither built nor queued |
//! | 5 | `UNAUTHORIZED` | Webhook API key rejected |
//! | 6 | `FETCH_FAILURE` | Repository fetch failed |
//! | 7 | `COMPILE_FAILURE` | Document compilation failed |
//! | 10 | `TIMEOUT` | An external tool exceeded its timeout |

/// Exit codes matching the documented exit code table.
///
/// # Example
///
/// ```rust
/// use intexration_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::NOT_FOUND, ExitCode::from_i32(4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Configuration error - invalid arguments, settings, or missing startup resources
    pub const CONFIG: ExitCode = ExitCode(2);

    /// Document not found - identifier is neither ready nor queued
    pub const NOT_FOUND: ExitCode = ExitCode(4);

    /// Unauthorized - webhook API key is not registered
    pub const UNAUTHORIZED: ExitCode = ExitCode(5);

    /// Fetch failure - source control could not fetch the submitted ref
    pub const FETCH_FAILURE: ExitCode = ExitCode(6);

    /// Compile failure - the typesetting compiler failed or produced no artifact
    pub const COMPILE_FAILURE: ExitCode = ExitCode(7);

    /// Timeout - an external tool was killed after its timeout
    pub const TIMEOUT: ExitCode = ExitCode(10);

    /// Get the numeric exit code value for `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
