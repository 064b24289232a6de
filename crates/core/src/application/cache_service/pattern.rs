// Pattern deletion over the global namespace

use super::CacheService;
use crate::domain::cache::MIN_DELETE_PATTERN_LEN;
use crate::error::{AppError, Result};
use tracing::{debug, info};

/// Reject patterns broad enough to wipe unrelated keys.
///
/// Length is counted in UTF-16 code units, so `"🙂🙂*"` has length 5.
///
/// # Errors
/// - AppError::Validation if the pattern is shorter than five characters
///   or made only of `*`
pub fn validate_delete_pattern(pattern: &str) -> Result<()> {
    if pattern.encode_utf16().count() < MIN_DELETE_PATTERN_LEN {
        return Err(AppError::Validation(format!(
            "Pattern length must be at least {}",
            MIN_DELETE_PATTERN_LEN
        )));
    }
    if pattern.chars().all(|c| c == '*') {
        return Err(AppError::Validation(
            "Pattern must not match every key".to_string(),
        ));
    }
    Ok(())
}

impl CacheService {
    /// Delete every key of the store matching `pattern` in one server-side
    /// step. The pattern is matched against full key names, not the service
    /// namespace.
    pub async fn remove_keys_by_pattern(&self, pattern: &str) -> Result<u64> {
        validate_delete_pattern(pattern)?;
        debug!(pattern = pattern, "Deleting keys by pattern");

        let deleted = self.global_store.delete_matching(pattern).await?;
        info!(pattern = pattern, deleted = deleted, "Keys deleted by pattern");
        Ok(deleted)
    }
}
