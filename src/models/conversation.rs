use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::enums::MessageRole;

/// One chat message in a patient conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub from: MessageRole,
    pub to: MessageRole,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    pub fn new(from: MessageRole, to: MessageRole, text: impl Into<String>, ts: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            text: text.into(),
            ts: ts.trunc_subsecs(3),
            read: false,
        }
    }

    pub fn is_unread_for_staff(&self) -> bool {
        self.to == MessageRole::Staff && !self.read
    }

    /// Flip `read` to true. Only staff-addressed messages are tracked; returns
    /// whether anything changed.
    pub fn mark_read(&mut self) -> bool {
        if self.is_unread_for_staff() {
            self.read = true;
            true
        } else {
            false
        }
    }
}
