//! History entry drafting. Pure: facts in, drafts out.

pub mod agreement;
pub mod can;

use shared_types::{HistoryType, SubjectRef};

/// An entry ready to be written, minus ids and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDraft {
    pub subject: SubjectRef,
    pub history_type: HistoryType,
    pub title: String,
    pub message: String,
}

impl HistoryDraft {
    pub fn new(
        subject: SubjectRef,
        history_type: HistoryType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            history_type,
            title: title.into(),
            message: message.into(),
        }
    }
}
