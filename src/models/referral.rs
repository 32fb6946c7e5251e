use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::ReferralStatus;

/// A saved referral. Field names follow the stored JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: String,
    pub patient_name: String,
    pub patient_age: String,
    pub patient_sex: String,
    pub date: NaiveDate,
    pub receiving_facility: String,
    pub reason: String,
    pub findings: String,
    #[serde(default)]
    pub attach_names: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
    pub status: ReferralStatus,
}

/// Referral form contents as submitted by the page. Values are raw text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ReferralDraft {
    pub patient_name: String,
    pub patient_age: String,
    pub patient_sex: String,
    pub date: String,
    pub receiving_facility: String,
    pub reason: String,
    pub findings: String,
    pub attachments: Vec<AttachmentUpload>,
}

/// A file picked in the form. Only its metadata is ever kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentUpload {
    pub name: String,
    pub size: u64,
}

/// Stored attachment metadata, keyed by referral id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub name: String,
    pub size: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
}

/// Required referral form fields. `as_str` is the form element id used for
/// highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferralField {
    PatientName,
    PatientAge,
    PatientSex,
    Date,
    ReceivingFacility,
    Reason,
    Findings,
}

impl ReferralField {
    pub const REQUIRED: [ReferralField; 7] = [
        Self::PatientName,
        Self::PatientAge,
        Self::PatientSex,
        Self::Date,
        Self::ReceivingFacility,
        Self::Reason,
        Self::Findings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatientName => "patient-name",
            Self::PatientAge => "patient-age",
            Self::PatientSex => "patient-sex",
            Self::Date => "referral-date",
            Self::ReceivingFacility => "receiving-facility",
            Self::Reason => "reason-referral",
            Self::Findings => "initial-findings",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PatientName => "Patient name",
            Self::PatientAge => "Age",
            Self::PatientSex => "Sex",
            Self::Date => "Referral date",
            Self::ReceivingFacility => "Receiving facility",
            Self::Reason => "Reason for referral",
            Self::Findings => "Initial findings",
        }
    }
}

impl std::fmt::Display for ReferralField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl ReferralDraft {
    pub fn field(&self, field: ReferralField) -> &str {
        match field {
            ReferralField::PatientName => &self.patient_name,
            ReferralField::PatientAge => &self.patient_age,
            ReferralField::PatientSex => &self.patient_sex,
            ReferralField::Date => &self.date,
            ReferralField::ReceivingFacility => &self.receiving_facility,
            ReferralField::Reason => &self.reason,
            ReferralField::Findings => &self.findings,
        }
    }

    pub fn set_field(&mut self, field: ReferralField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ReferralField::PatientName => self.patient_name = value,
            ReferralField::PatientAge => self.patient_age = value,
            ReferralField::PatientSex => self.patient_sex = value,
            ReferralField::Date => self.date = value,
            ReferralField::ReceivingFacility => self.receiving_facility = value,
            ReferralField::Reason => self.reason = value,
            ReferralField::Findings => self.findings = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_reads_browser_blob_with_extra_fields() {
        let raw = r#"{
            "id": "REF-2025-11-20-001",
            "patientName": "Latrel Angelo",
            "patientAge": "42",
            "patientSex": "male",
            "date": "2025-11-20",
            "receivingFacility": "City Hospital",
            "reason": "Check-up",
            "findings": "Stable",
            "attachNames": ["xray.png"],
            "attachFiles": [{}],
            "ts": 1763600000000,
            "status": "Pending"
        }"#;
        let referral: Referral = serde_json::from_str(raw).unwrap();
        assert_eq!(referral.id, "REF-2025-11-20-001");
        assert_eq!(referral.date, NaiveDate::from_ymd_opt(2025, 11, 20).unwrap());
        assert_eq!(referral.attach_names, vec!["xray.png".to_string()]);
        assert_eq!(referral.status, ReferralStatus::Pending);
    }

    #[test]
    fn draft_rejects_unknown_fields() {
        let raw = r#"{"patientName": "A", "favouriteColor": "blue"}"#;
        assert!(serde_json::from_str::<ReferralDraft>(raw).is_err());
    }

    #[test]
    fn draft_missing_fields_default_to_empty() {
        let draft: ReferralDraft = serde_json::from_str(r#"{"reason": "Check-up"}"#).unwrap();
        assert_eq!(draft.reason, "Check-up");
        assert!(draft.patient_name.is_empty());
        assert!(draft.attachments.is_empty());
    }

    #[test]
    fn set_field_and_field_agree() {
        let mut draft = ReferralDraft::default();
        for (i, field) in ReferralField::REQUIRED.iter().enumerate() {
            draft.set_field(*field, format!("v{i}"));
        }
        for (i, field) in ReferralField::REQUIRED.iter().enumerate() {
            assert_eq!(draft.field(*field), format!("v{i}"));
        }
    }
}
