//! Argument checks used at API boundaries

use crate::error::{CactusError, Result};

/// Reject empty and whitespace-only strings.
///
/// `subject` names the argument in the resulting error message.
pub fn non_blank_string(value: &str, subject: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CactusError::InvalidArgument(format!(
            "{} must be a non-blank string, got {:?}",
            subject, value
        )));
    }
    Ok(())
}
