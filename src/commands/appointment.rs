//! Appointment dashboard controller.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::appointment::{
    format_calendar_date, render_dashboard, AppointmentError, AppointmentStatusRepository,
    DashboardView,
};
use crate::models::AppointmentCard;

use super::{CommandError, Notice, Reaction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashboardEvent {
    Cycle { card_id: String },
    Approve { card_id: String },
    SelectDate { date: NaiveDate },
    OpenReschedule { card_id: String },
    CancelReschedule,
    ConfirmReschedule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleDialog {
    pub card_id: String,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardScreen {
    pub dashboard: DashboardView,
    pub reschedule: Option<RescheduleDialog>,
}

pub struct DashboardController {
    appointments: AppointmentStatusRepository,
    selected_date: Option<NaiveDate>,
    rescheduling: Option<String>,
}

impl DashboardController {
    /// Track the cards found on the page.
    pub fn new(
        appointments: AppointmentStatusRepository,
        cards: Vec<AppointmentCard>,
    ) -> Result<Self, CommandError> {
        for card in cards {
            appointments.register(card)?;
        }
        Ok(Self {
            appointments,
            selected_date: None,
            rescheduling: None,
        })
    }

    pub fn render(&self) -> DashboardScreen {
        let overlays = self.appointments.list();
        let reschedule = self.rescheduling.as_deref().and_then(|card_id| {
            overlays
                .iter()
                .find(|o| o.card_id == card_id)
                .map(|o| RescheduleDialog {
                    card_id: o.card_id.clone(),
                    info: format!("Patient: {}", o.patient_name),
                })
        });
        DashboardScreen {
            dashboard: render_dashboard(&overlays, self.selected_date),
            reschedule,
        }
    }

    pub fn handle(&mut self, event: DashboardEvent) -> Reaction<DashboardScreen> {
        let notice = match self.apply(event) {
            Ok(notice) => notice,
            Err(e) => e.into_notice(),
        };
        Reaction::new(self.render(), notice)
    }

    fn apply(&mut self, event: DashboardEvent) -> Result<Option<Notice>, CommandError> {
        match event {
            DashboardEvent::Cycle { card_id } => {
                self.appointments.cycle(&card_id)?;
                Ok(None)
            }
            DashboardEvent::Approve { card_id } => {
                self.appointments.approve(&card_id)?;
                Ok(Some(Notice::info("Appointment approved.")))
            }
            DashboardEvent::SelectDate { date } => {
                self.selected_date = Some(date);
                Ok(Some(Notice::info(format!(
                    "Selected date: {}",
                    format_calendar_date(date)
                ))))
            }
            DashboardEvent::OpenReschedule { card_id } => {
                if self.appointments.status_of(&card_id).is_none() {
                    return Err(AppointmentError::UnknownCard { card_id }.into());
                }
                self.rescheduling = Some(card_id);
                Ok(None)
            }
            DashboardEvent::CancelReschedule => {
                self.rescheduling = None;
                Ok(None)
            }
            DashboardEvent::ConfirmReschedule => {
                let Some(date) = self.selected_date else {
                    return Ok(Some(Notice::warning(
                        "Please select a date on the calendar first.",
                    )));
                };
                if let Some(card_id) = self.rescheduling.take() {
                    self.appointments.reschedule(&card_id, date)?;
                }
                Ok(Some(Notice::info(format!(
                    "Appointment rescheduled to {}",
                    format_calendar_date(date)
                ))))
            }
        }
    }
}
