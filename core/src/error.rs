use crate::webhook::WebhookError;

/// Failure kinds of the catalog and export pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// The row exists but the requested payload is empty or absent.
    #[error("{0}")]
    NoContent(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("failed to render {format}: {reason}")]
    Render {
        format: &'static str,
        reason: String,
    },
    #[error("stored payload of export {id} is corrupt: {reason}")]
    CorruptPayload { id: i64, reason: String },
    #[error(transparent)]
    Downstream(#[from] WebhookError),
}

impl ExportError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> u16 {
        match self {
            ExportError::Validation(_) => 400,
            ExportError::NotFound(_) | ExportError::NoContent(_) => 404,
            ExportError::Storage(_)
            | ExportError::Render { .. }
            | ExportError::CorruptPayload { .. }
            | ExportError::Downstream(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(ExportError::validation("test_suite_id is required").status(), 400);
        assert_eq!(ExportError::not_found("Not found").status(), 404);
        assert_eq!(ExportError::NoContent("empty".into()).status(), 404);
        assert_eq!(
            ExportError::Storage(rusqlite::Error::QueryReturnedNoRows).status(),
            500
        );
        assert_eq!(
            ExportError::Downstream(WebhookError::Rejected { status: 502 }).status(),
            500
        );
    }

    #[test]
    fn client_messages_are_passed_through_verbatim() {
        let err = ExportError::NoContent("No Excel file found for this export".into());
        assert_eq!(err.to_string(), "No Excel file found for this export");
        assert!(err.is_client_error());
    }
}
