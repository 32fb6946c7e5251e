//! Referral screen controller.
//!
//! The form draft, staged attachments, highlighted fields and open dialogs
//! are explicit session state. Saved referrals are always re-read from the
//! repository when the screen is rendered.

use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::PatientRegistry;
use crate::models::enums::ReferralStatus;
use crate::models::{AttachmentUpload, Referral, ReferralDraft, ReferralField};
use crate::print::{PrintTarget, PrintableReferral};
use crate::referral::{
    parse_form_date, render_attachments, render_preview, render_referral_detail,
    render_referral_list, AttachmentsView, ReferralDetail, ReferralError, ReferralListView,
    ReferralPreview, ReferralRepository,
};

use super::{CommandError, Notice, Reaction};

pub const CONFIRM_SUBMIT: &str =
    "Are you sure you want to submit this referral? You can print or change status later.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReferralEvent {
    /// Pick a registry patient; `None` clears the patient fields.
    SelectPatient { id: Option<String> },
    EditField { field: ReferralField, value: String },
    /// Replace the staged files with a new selection.
    AttachFiles { files: Vec<AttachmentUpload> },
    RemoveAttachment { index: usize },
    Preview,
    ClosePreview,
    PrintPreview,
    Submit,
    Confirm,
    CancelConfirm,
    ClearForm,
    View { id: String },
    CloseView,
    SetStatus { id: String, status: ReferralStatus },
    Delete { id: String },
    Print { id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralSession {
    pub draft: ReferralDraft,
    pub selected_patient: Option<String>,
    pub invalid_fields: Vec<ReferralField>,
    pub preview_open: bool,
    pub confirm_open: bool,
    pub viewing: Option<String>,
}

impl ReferralSession {
    fn blank(today: NaiveDate) -> Self {
        Self {
            draft: ReferralDraft {
                date: today.format("%Y-%m-%d").to_string(),
                ..ReferralDraft::default()
            },
            selected_patient: None,
            invalid_fields: Vec::new(),
            preview_open: false,
            confirm_open: false,
            viewing: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientOption {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralScreen {
    pub draft: ReferralDraft,
    pub referral_id: String,
    pub patient_options: Vec<PatientOption>,
    pub selected_patient: Option<String>,
    /// Form element ids to highlight.
    pub invalid_fields: Vec<String>,
    pub attachments: AttachmentsView,
    pub referrals: ReferralListView,
    pub preview: Option<ReferralPreview>,
    pub confirm: Option<String>,
    pub detail: Option<ReferralDetail>,
}

pub struct ReferralController {
    referrals: ReferralRepository,
    patients: PatientRegistry,
    printer: Arc<dyn PrintTarget>,
    session: ReferralSession,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl ReferralController {
    pub fn new(
        referrals: ReferralRepository,
        patients: PatientRegistry,
        printer: Arc<dyn PrintTarget>,
    ) -> Self {
        if let Err(e) = patients.load_or_seed() {
            tracing::warn!(error = %e, "Could not seed patient registry");
        }
        Self {
            referrals,
            patients,
            printer,
            session: ReferralSession::blank(today()),
        }
    }

    pub fn session(&self) -> &ReferralSession {
        &self.session
    }

    pub fn render(&self) -> ReferralScreen {
        let draft = &self.session.draft;
        let date = parse_form_date(&draft.date).unwrap_or_else(today);
        let saved = self.referrals.list();

        ReferralScreen {
            draft: draft.clone(),
            referral_id: self.referrals.next_id(date),
            patient_options: self
                .patients
                .list()
                .into_iter()
                .map(|p| PatientOption {
                    label: format!(
                        "{} — {} yrs",
                        p.name,
                        if p.age.is_empty() { "—" } else { p.age.as_str() }
                    ),
                    id: p.id,
                })
                .collect(),
            selected_patient: self.session.selected_patient.clone(),
            invalid_fields: self
                .session
                .invalid_fields
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
            attachments: render_attachments(&draft.attachments),
            referrals: render_referral_list(&saved),
            preview: self
                .session
                .preview_open
                .then(|| self.referrals.prepare(draft, Utc::now()).ok())
                .flatten()
                .map(|r| render_preview(&r)),
            confirm: self.session.confirm_open.then(|| CONFIRM_SUBMIT.to_string()),
            detail: self.session.viewing.as_deref().and_then(|id| {
                saved
                    .iter()
                    .find(|r| r.id == id)
                    .map(|r| render_referral_detail(r, &self.referrals.attachments_for(id)))
            }),
        }
    }

    pub fn handle(&mut self, event: ReferralEvent) -> Reaction<ReferralScreen> {
        let notice = match self.apply(event) {
            Ok(notice) => notice,
            Err(e) => e.into_notice(),
        };
        Reaction::new(self.render(), notice)
    }

    /// Validate the draft, recording highlighted fields either way.
    fn checked_draft(&mut self) -> Result<Referral, CommandError> {
        match self.referrals.prepare(&self.session.draft, Utc::now()) {
            Ok(referral) => {
                self.session.invalid_fields.clear();
                Ok(referral)
            }
            Err(ReferralError::Validation { fields }) => {
                self.session.invalid_fields = fields.clone();
                Err(ReferralError::Validation { fields }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn reset_form(&mut self) {
        self.session = ReferralSession {
            viewing: self.session.viewing.take(),
            ..ReferralSession::blank(today())
        };
    }

    fn apply(&mut self, event: ReferralEvent) -> Result<Option<Notice>, CommandError> {
        match event {
            ReferralEvent::SelectPatient { id: None } => {
                let draft = &mut self.session.draft;
                draft.patient_name.clear();
                draft.patient_age.clear();
                draft.patient_sex.clear();
                self.session.selected_patient = None;
                Ok(None)
            }
            ReferralEvent::SelectPatient { id: Some(id) } => {
                if let Some(patient) = self.patients.get(&id) {
                    let draft = &mut self.session.draft;
                    draft.patient_name = patient.name;
                    draft.patient_age = patient.age;
                    draft.patient_sex = patient.sex;
                    self.session.selected_patient = Some(id);
                }
                Ok(None)
            }
            ReferralEvent::EditField { field, value } => {
                self.session.draft.set_field(field, value);
                Ok(None)
            }
            ReferralEvent::AttachFiles { files } => {
                self.session.draft.attachments = files;
                Ok(None)
            }
            ReferralEvent::RemoveAttachment { index } => {
                let staged = &mut self.session.draft.attachments;
                if index < staged.len() {
                    staged.remove(index);
                }
                Ok(None)
            }
            ReferralEvent::Preview => {
                self.checked_draft()?;
                self.session.preview_open = true;
                Ok(None)
            }
            ReferralEvent::ClosePreview => {
                self.session.preview_open = false;
                Ok(None)
            }
            ReferralEvent::PrintPreview => {
                let prepared = self.checked_draft()?;
                self.printer.print(&PrintableReferral::from_preview(&prepared))?;
                Ok(None)
            }
            ReferralEvent::Submit => {
                self.checked_draft()?;
                self.session.confirm_open = true;
                Ok(None)
            }
            ReferralEvent::CancelConfirm => {
                self.session.confirm_open = false;
                Ok(None)
            }
            ReferralEvent::Confirm => {
                self.session.preview_open = false;
                self.session.confirm_open = false;
                self.checked_draft()?;
                let created = self.referrals.create(&self.session.draft, Utc::now())?;
                self.reset_form();
                Ok(Some(Notice::info(format!("Referral created: {}", created.id))))
            }
            ReferralEvent::ClearForm => {
                self.reset_form();
                Ok(None)
            }
            ReferralEvent::View { id } => {
                if self.referrals.get(&id).is_none() {
                    return Err(ReferralError::NotFound { id }.into());
                }
                self.session.viewing = Some(id);
                Ok(None)
            }
            ReferralEvent::CloseView => {
                self.session.viewing = None;
                Ok(None)
            }
            ReferralEvent::SetStatus { id, status } => {
                self.referrals.set_status(&id, status)?;
                self.session.viewing = None;
                Ok(Some(Notice::info("Status updated")))
            }
            ReferralEvent::Delete { id } => {
                self.referrals.delete(&id)?;
                if self.session.viewing.as_deref() == Some(id.as_str()) {
                    self.session.viewing = None;
                }
                Ok(Some(Notice::info("Referral deleted.")))
            }
            ReferralEvent::Print { id } => {
                let referral = self
                    .referrals
                    .get(&id)
                    .ok_or(ReferralError::NotFound { id })?;
                self.printer.print(&PrintableReferral::from_saved(&referral))?;
                Ok(None)
            }
        }
    }
}
