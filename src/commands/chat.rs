//! Communication screen controller.
//!
//! Events:
//! - `SelectPatient`: open a conversation and mark it read
//! - `Search`: filter the patient list by name
//! - `Send`: store a staff message and schedule the patient's reply
//! - `DeleteMessage`: remove one message from the open conversation
//! - `Resolve`: append the "resolved" system message

use serde::{Deserialize, Serialize};

use crate::chat::{
    render_chat, render_patient_list, ChatError, ChatView, ConversationRepository, PatientListItem,
    PendingReply,
};
use crate::models::RosterEntry;

use super::{CommandError, Notice, Reaction};

/// Per-screen UI state. Owned by the controller, never global.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub active_patient: Option<String>,
    pub search: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ChatEvent {
    SelectPatient(String),
    Search(String),
    Send(String),
    DeleteMessage(usize),
    Resolve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatScreen {
    pub patients: Vec<PatientListItem>,
    pub chat: Option<ChatView>,
}

pub struct ChatController {
    conversations: ConversationRepository,
    roster: Vec<RosterEntry>,
    session: ChatSession,
    pending: Vec<PendingReply>,
}

impl ChatController {
    pub fn new(conversations: ConversationRepository, roster: Vec<RosterEntry>) -> Self {
        Self {
            conversations,
            roster,
            session: ChatSession::default(),
            pending: Vec::new(),
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Rebuild the screen from storage.
    pub fn render(&self) -> ChatScreen {
        let active = self.session.active_patient.as_deref();
        ChatScreen {
            patients: render_patient_list(&self.roster, &self.conversations, &self.session.search, active),
            chat: active
                .and_then(|id| self.roster.iter().find(|p| p.id == id))
                .map(|entry| render_chat(entry, &self.conversations.messages_for(&entry.id))),
        }
    }

    pub fn handle(&mut self, event: ChatEvent) -> Reaction<ChatScreen> {
        let notice = match self.apply(event) {
            Ok(notice) => notice,
            Err(e) => e.into_notice(),
        };
        Reaction::new(self.render(), notice)
    }

    fn apply(&mut self, event: ChatEvent) -> Result<Option<Notice>, CommandError> {
        match event {
            ChatEvent::SelectPatient(id) => {
                if !self.roster.iter().any(|p| p.id == id) {
                    return Ok(None);
                }
                self.conversations.mark_all_read_for(&id)?;
                self.session.active_patient = Some(id);
                Ok(None)
            }
            ChatEvent::Search(text) => {
                self.session.search = text;
                Ok(None)
            }
            ChatEvent::Send(text) => {
                let reply = self
                    .conversations
                    .send_from_staff(self.session.active_patient.as_deref(), &text)?;
                self.pending.retain(|p| !p.is_finished());
                self.pending.push(reply);
                Ok(None)
            }
            ChatEvent::DeleteMessage(index) => {
                if let Some(id) = self.session.active_patient.as_deref() {
                    self.conversations.delete_message(id, index)?;
                }
                Ok(None)
            }
            ChatEvent::Resolve => {
                let Some(id) = self.session.active_patient.as_deref() else {
                    return Ok(Some(Notice::warning("Select a patient")));
                };
                self.conversations.resolve(id).map_err(ChatError::from)?;
                Ok(Some(Notice::info("Marked resolved (demo).")))
            }
        }
    }

    /// Replies scheduled but not yet landed.
    pub fn pending_replies(&self) -> usize {
        self.pending.iter().filter(|p| !p.is_finished()).count()
    }

    /// Wait for every scheduled reply, then return the refreshed screen.
    pub async fn settle(&mut self) -> ChatScreen {
        for reply in self.pending.drain(..) {
            reply.landed().await;
        }
        self.render()
    }

    /// Abort every reply that has not landed.
    pub fn cancel_pending(&mut self) {
        for reply in self.pending.drain(..) {
            reply.cancel();
        }
    }
}
