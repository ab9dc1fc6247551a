//! Path segment validation for owner, repository and document names.
//!
//! Every identifier segment becomes a directory or file name below the output
//! root, so a segment must never be able to address anything outside it.

use unicode_normalization::UnicodeNormalization;

use crate::error::BuildError;

/// Normalize a segment to NFKC and reject it if it could escape its parent directory.
///
/// Rejected: empty (after trimming), `.` and `..`, anything containing a path
/// separator, a NUL byte or other control characters. Fullwidth lookalikes such as
/// `．．` normalize to `..` first and are rejected as well.
///
/// A leading `-` is rejected too. Segments end up as arguments to git and the
/// compiler, where such a name would be parsed as an option.
///
/// # Errors
///
/// Returns [`BuildError::InvalidIdentifier`] describing the offending segment.
pub fn validate_segment(raw: &str) -> Result<String, BuildError> {
    let normalized: String = raw.nfkc().collect();
    let segment = normalized.trim();

    if segment.is_empty() {
        return Err(invalid("segment is empty"));
    }

    if segment == "." || segment == ".." {
        return Err(invalid(&format!("'{segment}' is not a valid name")));
    }

    if segment.starts_with('-') {
        return Err(invalid(&format!(
            "'{}' must not start with '-'",
            segment.escape_debug()
        )));
    }

    if let Some(bad) = segment
        .chars()
        .find(|c| matches!(c, '/' | '\\') || c.is_control())
    {
        return Err(invalid(&format!(
            "'{}' contains forbidden character {:?}",
            segment.escape_debug(),
            bad
        )));
    }

    Ok(segment.to_string())
}

fn invalid(reason: &str) -> BuildError {
    BuildError::InvalidIdentifier {
        reason: reason.to_string(),
    }
}
