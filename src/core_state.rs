//! Shared application state.
//!
//! `CoreState` owns the storage backend, runtime configuration, the static
//! roster and the print target, and hands out repositories and screen
//! controllers wired to them. Every repository it returns reads and writes
//! the same store, so all screens see each other's changes immediately.

use std::sync::Arc;

use crate::appointment::AppointmentStatusRepository;
use crate::chat::{default_roster, ConversationRepository, ReplySettings};
use crate::commands::appointment::DashboardController;
use crate::commands::chat::ChatController;
use crate::commands::records::RecordsController;
use crate::commands::referral::ReferralController;
use crate::commands::CommandError;
use crate::config::PortalConfig;
use crate::db::{MemoryStore, PatientRegistry, SharedStore, SqliteStore, StorageError};
use crate::models::{AppointmentCard, RosterEntry};
use crate::print::{PdfPrintTarget, PrintTarget};
use crate::referral::ReferralRepository;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    config: PortalConfig,
    store: SharedStore,
    roster: Vec<RosterEntry>,
    printer: Arc<dyn PrintTarget>,
    /// Dashboard overlay. Process-local, never written to `store`.
    appointments: AppointmentStatusRepository,
}

impl CoreState {
    /// Open the durable store at `config.storage_path()`.
    pub fn open(config: PortalConfig) -> Result<Self, CoreError> {
        let path = config.storage_path();
        let store = SqliteStore::open(&path)?;
        tracing::info!(path = %path.display(), "Local storage opened");
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// State backed by a throwaway in-memory store.
    pub fn in_memory(config: PortalConfig) -> Self {
        Self::with_store(config, MemoryStore::shared())
    }

    pub fn with_store(config: PortalConfig, store: SharedStore) -> Self {
        let printer: Arc<dyn PrintTarget> = Arc::new(PdfPrintTarget::new(config.exports_dir()));
        Self {
            config,
            store,
            roster: default_roster(),
            printer,
            appointments: AppointmentStatusRepository::new(),
        }
    }

    /// Replace the print target.
    pub fn with_print_target(mut self, printer: Arc<dyn PrintTarget>) -> Self {
        self.printer = printer;
        self
    }

    /// Replace the communication roster.
    pub fn with_roster(mut self, roster: Vec<RosterEntry>) -> Self {
        self.roster = roster;
        self
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn conversations(&self) -> ConversationRepository {
        ConversationRepository::new(
            self.store.clone(),
            ReplySettings {
                delay: self.config.reply_delay,
                text: self.config.reply_text.clone(),
            },
        )
    }

    pub fn referrals(&self) -> ReferralRepository {
        ReferralRepository::new(self.store.clone())
    }

    pub fn patients(&self) -> PatientRegistry {
        PatientRegistry::new(self.store.clone())
    }

    pub fn appointments(&self) -> &AppointmentStatusRepository {
        &self.appointments
    }

    // ── Controllers ─────────────────────────────────────────

    pub fn chat_controller(&self) -> ChatController {
        ChatController::new(self.conversations(), self.roster.clone())
    }

    pub fn referral_controller(&self) -> ReferralController {
        ReferralController::new(self.referrals(), self.patients(), self.printer.clone())
    }

    pub fn records_controller(&self) -> RecordsController {
        RecordsController::new(self.patients())
    }

    pub fn dashboard_controller(
        &self,
        cards: Vec<AppointmentCard>,
    ) -> Result<DashboardController, CommandError> {
        DashboardController::new(self.appointments.clone(), cards)
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
