//! Patient communication inbox: conversation repository, simulated replies
//! and the inbox/chat view types.
//!
//! Conversations live under one storage key as a map from patient id to the
//! ordered message list. Staff messages are appended synchronously; the
//! patient's canned reply is appended later by a Tokio task that captured the
//! conversation id when it was scheduled.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::{CONVERSATIONS_KEY, REPLY_TIMESTAMP_OFFSET_MS};
use crate::db::{KeyedRepository, SharedStore, StorageError};
use crate::models::enums::MessageRole;
use crate::models::{Message, RosterEntry};

pub const RESOLVED_TEXT: &str = "Conversation marked resolved";
pub const NO_MESSAGES: &str = "No messages yet";
pub const EMPTY_CHAT_HINT: &str = "No conversation — send the first message.";

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Select a patient first.")]
    NoPatientSelected,
    #[error("Type a message before sending.")]
    EmptyMessage,
    #[error("No async runtime available to deliver the reply")]
    RuntimeUnavailable,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Demo roster shown on the communication screen.
pub fn default_roster() -> Vec<RosterEntry> {
    vec![
        RosterEntry {
            id: "p1".into(),
            name: "Latrel Angelo".into(),
            avatar_text: "LA".into(),
            img: Some("images/Latrel.jfif".into()),
        },
        RosterEntry {
            id: "p2".into(),
            name: "Steph Landicho".into(),
            avatar_text: "SL".into(),
            img: Some("images/Steph.jfif".into()),
        },
        RosterEntry {
            id: "p3".into(),
            name: "Jay Albufera".into(),
            avatar_text: "JA".into(),
            img: None,
        },
    ]
}

// ═══════════════════════════════════════════
// Simulated reply
// ═══════════════════════════════════════════

/// What the simulated patient sends back, and when.
#[derive(Debug, Clone)]
pub struct ReplySettings {
    pub delay: Duration,
    pub text: String,
}

impl Default for ReplySettings {
    fn default() -> Self {
        let config = crate::config::PortalConfig::default();
        Self {
            delay: config.reply_delay,
            text: config.reply_text,
        }
    }
}

/// A scheduled patient reply. Dropping it does not cancel the reply.
#[derive(Debug)]
pub struct PendingReply {
    patient_id: String,
    handle: JoinHandle<()>,
}

impl PendingReply {
    /// Conversation the reply will be appended to.
    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the reply if it has not landed yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Wait for the reply task. Returns false if it was cancelled.
    pub async fn landed(self) -> bool {
        self.handle.await.is_ok()
    }
}

// ═══════════════════════════════════════════
// Repository
// ═══════════════════════════════════════════

/// Conversations keyed by patient id.
#[derive(Clone)]
pub struct ConversationRepository {
    repo: KeyedRepository<Message>,
    reply: ReplySettings,
}

impl ConversationRepository {
    pub fn new(store: SharedStore, reply: ReplySettings) -> Self {
        Self {
            repo: KeyedRepository::new(store, CONVERSATIONS_KEY),
            reply,
        }
    }

    pub fn messages_for(&self, patient_id: &str) -> Vec<Message> {
        self.repo.list_for(patient_id)
    }

    pub fn last_message_for(&self, patient_id: &str) -> Option<Message> {
        self.repo.list_for(patient_id).pop()
    }

    /// Messages addressed to staff that have not been read.
    pub fn unread_count_for(&self, patient_id: &str) -> usize {
        self.repo.count_where(patient_id, Message::is_unread_for_staff)
    }

    /// Append a staff message and schedule the patient's reply.
    ///
    /// Must be called from within a Tokio runtime; without one nothing is
    /// written and `RuntimeUnavailable` is returned.
    pub fn send_from_staff(
        &self,
        patient_id: Option<&str>,
        text: &str,
    ) -> Result<PendingReply, ChatError> {
        let patient_id = patient_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ChatError::NoPatientSelected)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ChatError::RuntimeUnavailable)?;

        let message = Message::new(MessageRole::Staff, MessageRole::Patient, text, Utc::now());
        self.repo.append(patient_id, message)?;
        tracing::debug!(patient_id, "Staff message stored");

        let owner = patient_id.to_string();
        let repo = self.repo.clone();
        let reply = self.reply.clone();
        let handle = runtime.spawn({
            let owner = owner.clone();
            async move {
                tokio::time::sleep(reply.delay).await;
                let ts = Utc::now() + chrono::Duration::milliseconds(REPLY_TIMESTAMP_OFFSET_MS);
                let message = Message::new(MessageRole::Patient, MessageRole::Staff, reply.text, ts);
                match repo.append(&owner, message) {
                    Ok(_) => tracing::debug!(patient_id = %owner, "Simulated reply stored"),
                    Err(e) => tracing::warn!(patient_id = %owner, error = %e, "Simulated reply lost"),
                }
            }
        });

        Ok(PendingReply {
            patient_id: owner,
            handle,
        })
    }

    /// Mark every staff-addressed message for the patient as read.
    /// Returns how many flipped; repeated calls change nothing.
    pub fn mark_all_read_for(&self, patient_id: &str) -> Result<usize, StorageError> {
        let changed = self
            .repo
            .mutate(patient_id, Message::is_unread_for_staff, |m| {
                m.mark_read();
            })?;
        if changed > 0 {
            tracing::debug!(patient_id, changed, "Marked messages read");
        }
        Ok(changed)
    }

    /// Delete the message at `index` as currently stored. No-op when absent.
    pub fn delete_message(
        &self,
        patient_id: &str,
        index: usize,
    ) -> Result<Option<Message>, StorageError> {
        self.repo.remove_at(patient_id, index)
    }

    /// Append the system "resolved" notice. It is addressed to staff and
    /// counts as unread like any other inbound message.
    pub fn resolve(&self, patient_id: &str) -> Result<(), StorageError> {
        let message = Message::new(MessageRole::System, MessageRole::Staff, RESOLVED_TEXT, Utc::now());
        self.repo.append(patient_id, message)?;
        tracing::info!(patient_id, "Conversation resolved");
        Ok(())
    }
}

// ═══════════════════════════════════════════
// View types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Avatar {
    Image { src: String, alt: String },
    Initials { text: String },
}

impl Avatar {
    fn for_entry(entry: &RosterEntry) -> Self {
        match &entry.img {
            Some(src) => Avatar::Image {
                src: src.clone(),
                alt: entry.name.clone(),
            },
            None => Avatar::Initials {
                text: entry.avatar_text.clone(),
            },
        }
    }
}

/// One row of the inbox sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientListItem {
    pub id: String,
    pub name: String,
    pub avatar: Avatar,
    /// `None` hides the badge.
    pub unread: Option<usize>,
    pub preview: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BubbleSide {
    Staff,
    Patient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBubble {
    /// Position in the stored list; valid until the next delete.
    pub index: usize,
    pub side: BubbleSide,
    pub text: String,
    pub sent_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatView {
    pub patient_id: String,
    pub name: String,
    pub avatar: Avatar,
    pub subtitle: String,
    pub bubbles: Vec<MessageBubble>,
    pub empty_hint: Option<String>,
}

/// Local display form of a stored timestamp.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Truncate a message for the sidebar preview without splitting characters.
pub fn preview_text(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(PREVIEW_CHARS) {
        Some((boundary, _)) => format!("{}...", &trimmed[..boundary]),
        None => trimmed.to_string(),
    }
}

/// Inbox sidebar: roster filtered by name, with unread badges and previews.
pub fn render_patient_list(
    roster: &[RosterEntry],
    conversations: &ConversationRepository,
    filter: &str,
    active: Option<&str>,
) -> Vec<PatientListItem> {
    let needle = filter.to_lowercase();
    roster
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .map(|p| {
            let messages = conversations.messages_for(&p.id);
            let unread = messages.iter().filter(|m| m.is_unread_for_staff()).count();
            PatientListItem {
                id: p.id.clone(),
                name: p.name.clone(),
                avatar: Avatar::for_entry(p),
                unread: (unread > 0).then_some(unread),
                preview: messages
                    .last()
                    .map(|m| preview_text(&m.text))
                    .unwrap_or_else(|| NO_MESSAGES.to_string()),
                active: active == Some(p.id.as_str()),
            }
        })
        .collect()
}

/// Conversation pane for one roster entry.
pub fn render_chat(entry: &RosterEntry, messages: &[Message]) -> ChatView {
    let bubbles = messages
        .iter()
        .enumerate()
        .map(|(index, m)| MessageBubble {
            index,
            side: if m.from == MessageRole::Staff {
                BubbleSide::Staff
            } else {
                BubbleSide::Patient
            },
            text: m.text.clone(),
            sent_at: format_timestamp(&m.ts),
        })
        .collect::<Vec<_>>();

    ChatView {
        patient_id: entry.id.clone(),
        name: entry.name.clone(),
        avatar: Avatar::for_entry(entry),
        subtitle: messages
            .last()
            .map(|m| format_timestamp(&m.ts))
            .unwrap_or_else(|| NO_MESSAGES.to_string()),
        empty_hint: bubbles.is_empty().then(|| EMPTY_CHAT_HINT.to_string()),
        bubbles,
    }
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
