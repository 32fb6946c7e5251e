//! Screen controllers.
//!
//! Each controller owns its screen's session state, turns one UI event into
//! repository calls, and answers with a freshly rendered view plus an
//! optional notice. Failures never escape a controller: they become notices
//! and the stored state stays as it was.

pub mod appointment;
pub mod chat;
pub mod records;
pub mod referral;

use serde::{Deserialize, Serialize};

use crate::appointment::AppointmentError;
use crate::chat::ChatError;
use crate::db::StorageError;
use crate::print::PrintError;
use crate::referral::ReferralError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// What a controller hands back after every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction<V> {
    pub view: V,
    pub notice: Option<Notice>,
}

impl<V> Reaction<V> {
    pub fn new(view: V, notice: Option<Notice>) -> Self {
        Self { view, notice }
    }

    pub fn message(&self) -> Option<&str> {
        self.notice.as_ref().map(|n| n.message.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Referral(#[from] ReferralError),
    #[error(transparent)]
    Appointment(#[from] AppointmentError),
    #[error(transparent)]
    Print(#[from] PrintError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

const SAVE_FAILED: &str = "Could not save changes. Nothing was modified.";

impl CommandError {
    /// Notice shown for this failure. `None` means the event is silently
    /// ignored.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            CommandError::Chat(ChatError::EmptyMessage | ChatError::NoPatientSelected) => {
                Some(Notice::warning(self.to_string()))
            }
            CommandError::Chat(ChatError::RuntimeUnavailable) => Some(Notice::error(self.to_string())),
            CommandError::Referral(ReferralError::Validation { .. }) => {
                Some(Notice::warning(self.to_string()))
            }
            CommandError::Referral(ReferralError::NotFound { .. }) => Some(Notice::info(self.to_string())),
            CommandError::Appointment(AppointmentError::UnknownCard { .. }) => None,
            CommandError::Print(PrintError::PopupBlocked) => Some(Notice::warning(self.to_string())),
            CommandError::Print(e) => Some(Notice::error(format!("Could not print: {e}"))),
            CommandError::Chat(ChatError::Storage(_))
            | CommandError::Referral(ReferralError::Storage(_))
            | CommandError::Appointment(AppointmentError::Storage(_))
            | CommandError::Storage(_) => Some(Notice::error(SAVE_FAILED)),
        }
    }

    /// Log and convert to the notice a controller returns.
    pub(crate) fn into_notice(self) -> Option<Notice> {
        match &self {
            CommandError::Chat(ChatError::Storage(_))
            | CommandError::Referral(ReferralError::Storage(_))
            | CommandError::Appointment(AppointmentError::Storage(_))
            | CommandError::Storage(_)
            | CommandError::Print(_) => tracing::warn!(error = %self, "Command failed"),
            _ => tracing::debug!(error = %self, "Command rejected"),
        }
        self.notice()
    }
}
