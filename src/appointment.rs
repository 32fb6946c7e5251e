//! Appointment dashboard overlay.
//!
//! Appointment cards come from the page markup; this module only layers
//! presentation state on top of them (status badge, approval, reschedule
//! dates). The overlay lives in a process-local store and is gone when the
//! session ends.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{ListRepository, MemoryStore, SharedStore, StorageError};
use crate::models::enums::AppointmentStatus;
use crate::models::{AppointmentCard, AppointmentOverlay};

const OVERLAY_KEY: &str = "appointment_overlays";

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Unknown appointment card: {card_id}")]
    UnknownCard { card_id: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Dashboard stat cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentCounts {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
}

/// Calendar date as the dashboard prints it, e.g. `Thu Nov 20 2025`.
pub fn format_calendar_date(date: NaiveDate) -> String {
    date.format("%a %b %d %Y").to_string()
}

// ─── Repository ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppointmentStatusRepository {
    overlays: ListRepository<AppointmentOverlay>,
}

impl Default for AppointmentStatusRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentStatusRepository {
    /// Overlay backed by a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::shared())
    }

    pub fn with_store(store: SharedStore) -> Self {
        Self {
            overlays: ListRepository::new(store, OVERLAY_KEY),
        }
    }

    pub fn list(&self) -> Vec<AppointmentOverlay> {
        self.overlays.list()
    }

    /// Track a card. Re-registering a known card keeps its current overlay.
    pub fn register(&self, card: AppointmentCard) -> Result<AppointmentOverlay, AppointmentError> {
        if let Some(existing) = self.overlays.find(|o| o.card_id == card.card_id) {
            return Ok(existing);
        }
        let overlay = AppointmentOverlay::from(card);
        self.overlays.append(overlay.clone())?;
        Ok(overlay)
    }

    pub fn status_of(&self, card_id: &str) -> Option<AppointmentStatus> {
        self.overlays.find(|o| o.card_id == card_id).map(|o| o.status)
    }

    /// Advance Pending → Approved → Completed → Pending.
    pub fn cycle(&self, card_id: &str) -> Result<AppointmentStatus, AppointmentError> {
        let mut next = None;
        self.overlays.mutate(
            |o| o.card_id == card_id,
            |o| {
                o.status = o.status.next();
                next = Some(o.status);
            },
        )?;
        let status = next.ok_or_else(|| AppointmentError::UnknownCard {
            card_id: card_id.to_string(),
        })?;
        tracing::debug!(card_id, status = %status, "Appointment status cycled");
        Ok(status)
    }

    pub fn approve(&self, card_id: &str) -> Result<(), AppointmentError> {
        self.set_where(card_id, |o| o.status = AppointmentStatus::Approved)?;
        tracing::debug!(card_id, "Appointment approved");
        Ok(())
    }

    /// Record a new date. Earlier reschedules are kept in order.
    pub fn reschedule(&self, card_id: &str, date: NaiveDate) -> Result<(), AppointmentError> {
        self.set_where(card_id, |o| o.rescheduled_to.push(date))?;
        tracing::debug!(card_id, %date, "Appointment rescheduled");
        Ok(())
    }

    pub fn counts(&self) -> AppointmentCounts {
        counts_of(&self.overlays.list())
    }

    fn set_where(
        &self,
        card_id: &str,
        transform: impl FnMut(&mut AppointmentOverlay),
    ) -> Result<(), AppointmentError> {
        match self.overlays.mutate(|o| o.card_id == card_id, transform)? {
            0 => Err(AppointmentError::UnknownCard {
                card_id: card_id.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn counts_of(overlays: &[AppointmentOverlay]) -> AppointmentCounts {
    AppointmentCounts {
        total: overlays.len(),
        pending: overlays
            .iter()
            .filter(|o| o.status == AppointmentStatus::Pending)
            .count(),
        completed: overlays
            .iter()
            .filter(|o| o.status == AppointmentStatus::Completed)
            .count(),
    }
}

// ─── View ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentCardView {
    pub card_id: String,
    pub patient_name: String,
    pub status: AppointmentStatus,
    pub badge: String,
    pub css_class: String,
    pub rescheduled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub cards: Vec<AppointmentCardView>,
    pub counts: AppointmentCounts,
    pub selected_date: Option<String>,
}

pub fn render_dashboard(overlays: &[AppointmentOverlay], selected: Option<NaiveDate>) -> DashboardView {
    DashboardView {
        cards: overlays
            .iter()
            .map(|o| AppointmentCardView {
                card_id: o.card_id.clone(),
                patient_name: o.patient_name.clone(),
                status: o.status,
                badge: o.status.to_string(),
                css_class: o.status.css_class().to_string(),
                rescheduled: o
                    .rescheduled_to
                    .iter()
                    .map(|d| format!("🔁 {}", format_calendar_date(*d)))
                    .collect(),
            })
            .collect(),
        counts: counts_of(overlays),
        selected_date: selected.map(format_calendar_date),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, name: &str, status: AppointmentStatus) -> AppointmentCard {
        AppointmentCard {
            card_id: id.into(),
            patient_name: name.into(),
            status,
        }
    }

    fn seeded() -> AppointmentStatusRepository {
        let repo = AppointmentStatusRepository::new();
        repo.register(card("a1", "Latrel Angelo", AppointmentStatus::Pending)).unwrap();
        repo.register(card("a2", "Steph Landicho", AppointmentStatus::Approved)).unwrap();
        repo.register(card("a3", "Jay Albufera", AppointmentStatus::Completed)).unwrap();
        repo
    }

    #[test]
    fn cycle_wraps_around() {
        let repo = seeded();
        assert_eq!(repo.cycle("a1").unwrap(), AppointmentStatus::Approved);
        assert_eq!(repo.cycle("a1").unwrap(), AppointmentStatus::Completed);
        assert_eq!(repo.cycle("a1").unwrap(), AppointmentStatus::Pending);
        assert_eq!(repo.status_of("a1"), Some(AppointmentStatus::Pending));
    }

    #[test]
    fn unknown_card_errors() {
        let repo = seeded();
        assert!(matches!(repo.cycle("zz"), Err(AppointmentError::UnknownCard { .. })));
        assert!(matches!(repo.approve("zz"), Err(AppointmentError::UnknownCard { .. })));
        let date = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        assert!(matches!(
            repo.reschedule("zz", date),
            Err(AppointmentError::UnknownCard { .. })
        ));
        assert_eq!(repo.status_of("zz"), None);
    }

    #[test]
    fn register_is_idempotent() {
        let repo = seeded();
        repo.cycle("a1").unwrap();
        let again = repo
            .register(card("a1", "Latrel Angelo", AppointmentStatus::Pending))
            .unwrap();
        assert_eq!(again.status, AppointmentStatus::Approved);
        assert_eq!(repo.list().len(), 3);
    }

    #[test]
    fn counts_follow_status_changes() {
        let repo = seeded();
        assert_eq!(
            repo.counts(),
            AppointmentCounts { total: 3, pending: 1, completed: 1 }
        );
        repo.approve("a1").unwrap();
        assert_eq!(repo.counts().pending, 0);
        repo.cycle("a2").unwrap();
        assert_eq!(repo.counts().completed, 2);
    }

    #[test]
    fn reschedule_appends_dates() {
        let repo = seeded();
        let first = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        let second = NaiveDate::from_ymd_opt(2025, 11, 27).unwrap();
        repo.reschedule("a2", first).unwrap();
        repo.reschedule("a2", second).unwrap();

        let view = render_dashboard(&repo.list(), Some(second));
        let a2 = &view.cards[1];
        assert_eq!(a2.rescheduled, vec!["🔁 Thu Nov 20 2025", "🔁 Thu Nov 27 2025"]);
        assert_eq!(view.selected_date.as_deref(), Some("Thu Nov 27 2025"));
    }

    #[test]
    fn dashboard_badges_and_classes() {
        let view = render_dashboard(&seeded().list(), None);
        assert_eq!(view.cards.len(), 3);
        assert_eq!(view.cards[0].badge, "Pending");
        assert_eq!(view.cards[0].css_class, "status-pending");
        assert_eq!(view.cards[2].css_class, "status-completed");
        assert_eq!(view.counts.total, 3);
        assert!(view.selected_date.is_none());
    }

    #[test]
    fn separate_overlays_do_not_share_state() {
        let a = seeded();
        let b = AppointmentStatusRepository::new();
        assert_eq!(a.list().len(), 3);
        assert!(b.list().is_empty());
    }
}
