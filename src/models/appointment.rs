use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::AppointmentStatus;

/// An appointment card as found in the page markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentCard {
    pub card_id: String,
    pub patient_name: String,
    pub status: AppointmentStatus,
}

/// Presentation state layered over one appointment card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentOverlay {
    pub card_id: String,
    pub patient_name: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub rescheduled_to: Vec<NaiveDate>,
}

impl From<AppointmentCard> for AppointmentOverlay {
    fn from(card: AppointmentCard) -> Self {
        Self {
            card_id: card.card_id,
            patient_name: card.patient_name,
            status: card.status,
            rescheduled_to: Vec::new(),
        }
    }
}
