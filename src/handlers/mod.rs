//! HTTP handlers, grouped by resource. Every handler returns `Result<_, ApiError>` so
//! failures share the `{ "error": ... }` envelope.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::{error::ApiError, models::ModerationStatus};

pub mod auth;
pub mod categories;
pub mod comments;
pub mod edit_requests;
pub mod geocoding;
pub mod markers;
pub mod media;
pub mod stats;

/// StatusFilter
///
/// Optional `?status=` filter shared by the moderation listings.
#[derive(Debug, Deserialize, IntoParams, Default)]
pub struct StatusFilter {
    /// `pending`, `approved` or `rejected`. All records when omitted.
    pub status: Option<ModerationStatus>,
}

/// Moderation endpoints decide, they never send a record back to the queue.
pub(crate) fn moderation_target(status: ModerationStatus) -> Result<ModerationStatus, ApiError> {
    match status {
        ModerationStatus::Pending => Err(ApiError::Validation(
            "status must be approved or rejected".to_string(),
        )),
        decided => Ok(decided),
    }
}

/// Empty or whitespace-only optional text is treated as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_not_a_moderation_decision() {
        assert!(moderation_target(ModerationStatus::Pending).is_err());
        assert_eq!(
            moderation_target(ModerationStatus::Rejected),
            Ok(ModerationStatus::Rejected)
        );
    }

    #[test]
    fn blank_text_is_dropped() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" café ".to_string())).as_deref(), Some("café"));
        assert_eq!(non_blank(None), None);
    }
}
