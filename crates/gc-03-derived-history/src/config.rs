use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Skip entries already written for the same event, subject and type.
    pub deduplicate: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { deduplicate: true }
    }
}
