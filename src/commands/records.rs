//! Records browser controller.

use serde::{Deserialize, Serialize};

use crate::db::PatientRegistry;
use crate::records::{render_patient_detail, render_records, PatientCardView, PatientDetailView};

use super::Reaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecordsEvent {
    Search { query: String },
    View { id: String },
    CloseDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordsScreen {
    pub cards: Vec<PatientCardView>,
    pub detail: Option<PatientDetailView>,
}

pub struct RecordsController {
    patients: PatientRegistry,
    query: String,
    viewing: Option<String>,
}

impl RecordsController {
    pub fn new(patients: PatientRegistry) -> Self {
        if let Err(e) = patients.load_or_seed() {
            tracing::warn!(error = %e, "Could not seed patient registry");
        }
        Self {
            patients,
            query: String::new(),
            viewing: None,
        }
    }

    pub fn render(&self) -> RecordsScreen {
        RecordsScreen {
            cards: render_records(&self.patients.list(), &self.query),
            detail: self
                .viewing
                .as_deref()
                .and_then(|id| self.patients.get(id))
                .map(|p| render_patient_detail(&p)),
        }
    }

    pub fn handle(&mut self, event: RecordsEvent) -> Reaction<RecordsScreen> {
        match event {
            RecordsEvent::Search { query } => self.query = query,
            RecordsEvent::View { id } => self.viewing = Some(id),
            RecordsEvent::CloseDetail => self.viewing = None,
        }
        Reaction::new(self.render(), None)
    }
}
