//! Referral form backend: id sequencing, validation, persistence and the
//! list/detail/preview view types.
//!
//! Referrals are a flat list under one key; attachment metadata lives under a
//! second key as a map from referral id to the files picked at submission.
//! Only names and sizes are kept, never file content.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::format_timestamp;
use crate::config::{ATTACHMENTS_KEY, REFERRALS_KEY, REFERRAL_SEQUENCE_KEY};
use crate::db::{KeyedRepository, ListRepository, RecordRepository, SharedStore, StorageError};
use crate::models::enums::ReferralStatus;
use crate::models::{AttachmentMeta, AttachmentUpload, Referral, ReferralDraft, ReferralField};

pub const NO_REFERRALS: &str = "No referrals created yet.";
pub const NO_ATTACHMENTS: &str = "No attachments";

const ID_PREFIX: &str = "REF";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("Please fill required fields (highlighted).")]
    Validation { fields: Vec<ReferralField> },
    #[error("Referral not found")]
    NotFound { id: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// `REF-YYYY-MM-DD` for the given referral date.
pub fn referral_prefix(date: NaiveDate) -> String {
    format!("{ID_PREFIX}-{}", date.format(DATE_FORMAT))
}

/// Sequence number of `id` if it was issued under `prefix`.
fn sequence_of(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.strip_prefix('-')?.parse().ok()
}

/// Parse a form date (`YYYY-MM-DD`).
pub fn parse_form_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Check every required field. Returns the parsed referral date, or the full
/// list of invalid fields in form order.
pub fn validate_draft(draft: &ReferralDraft) -> Result<NaiveDate, ReferralError> {
    let mut invalid: Vec<ReferralField> = ReferralField::REQUIRED
        .iter()
        .copied()
        .filter(|f| draft.field(*f).trim().is_empty())
        .collect();

    let date = parse_form_date(&draft.date);
    if date.is_none() && !invalid.contains(&ReferralField::Date) {
        invalid.push(ReferralField::Date);
        invalid.sort_by_key(|f| ReferralField::REQUIRED.iter().position(|r| r == f));
    }

    match date {
        Some(date) if invalid.is_empty() => Ok(date),
        _ => Err(ReferralError::Validation { fields: invalid }),
    }
}

// ═══════════════════════════════════════════
// Repository
// ═══════════════════════════════════════════

#[derive(Clone)]
pub struct ReferralRepository {
    referrals: ListRepository<Referral>,
    attachments: KeyedRepository<AttachmentMeta>,
    /// Highest sequence ever issued per `REF-YYYY-MM-DD` prefix. Never lowered.
    issued: RecordRepository<BTreeMap<String, u64>>,
}

impl ReferralRepository {
    pub fn new(store: SharedStore) -> Self {
        Self {
            referrals: ListRepository::new(store.clone(), REFERRALS_KEY),
            attachments: KeyedRepository::new(store.clone(), ATTACHMENTS_KEY),
            issued: RecordRepository::new(store, REFERRAL_SEQUENCE_KEY),
        }
    }

    pub fn list(&self) -> Vec<Referral> {
        self.referrals.list()
    }

    pub fn get(&self, id: &str) -> Option<Referral> {
        self.referrals.find(|r| r.id == id)
    }

    pub fn attachments_for(&self, id: &str) -> Vec<AttachmentMeta> {
        self.attachments.list_for(id)
    }

    /// Next id for `date`: `REF-YYYY-MM-DD-NNN`.
    ///
    /// The sequence is one past the largest of the same-day count, the highest
    /// surviving same-day suffix and the highest suffix ever issued for that
    /// day, so a deleted id is never handed out again.
    pub fn next_id(&self, date: NaiveDate) -> String {
        let prefix = referral_prefix(date);
        let same_day: Vec<u64> = self
            .referrals
            .list()
            .iter()
            .filter(|r| r.id.starts_with(&prefix))
            .map(|r| sequence_of(&r.id, &prefix).unwrap_or(0))
            .collect();
        let highest = same_day.iter().copied().max().unwrap_or(0);
        let issued = self.issued.load().get(&prefix).copied().unwrap_or(0);
        let seq = (same_day.len() as u64)
            .max(highest)
            .max(issued)
            .saturating_add(1);
        format!("{prefix}-{seq:03}")
    }

    /// Raise the issued high-water mark for the id's day.
    fn record_issued(&self, referral: &Referral) -> Result<(), StorageError> {
        let prefix = referral_prefix(referral.date);
        let Some(seq) = sequence_of(&referral.id, &prefix) else {
            return Ok(());
        };
        self.issued.update_if(|marks| {
            let mark = marks.entry(prefix).or_insert(0);
            (seq > *mark).then(|| *mark = seq)
        })?;
        Ok(())
    }

    /// Validate `draft` and build the referral it would create, without
    /// persisting anything. Used by the preview.
    pub fn prepare(&self, draft: &ReferralDraft, now: DateTime<Utc>) -> Result<Referral, ReferralError> {
        let date = validate_draft(draft)?;
        Ok(Referral {
            id: self.next_id(date),
            patient_name: draft.patient_name.trim().to_string(),
            patient_age: draft.patient_age.trim().to_string(),
            patient_sex: draft.patient_sex.trim().to_string(),
            date,
            receiving_facility: draft.receiving_facility.trim().to_string(),
            reason: draft.reason.trim().to_string(),
            findings: draft.findings.trim().to_string(),
            attach_names: draft.attachments.iter().map(|a| a.name.clone()).collect(),
            // Stored with millisecond precision.
            ts: now.trunc_subsecs(3),
            status: ReferralStatus::Pending,
        })
    }

    /// Validate, assign an id, persist, then record attachment metadata under
    /// the new id. Nothing is written when validation fails.
    pub fn create(&self, draft: &ReferralDraft, now: DateTime<Utc>) -> Result<Referral, ReferralError> {
        let referral = self.prepare(draft, now)?;
        self.referrals.append(referral.clone())?;
        self.record_issued(&referral)?;

        let metas: Vec<AttachmentMeta> = draft
            .attachments
            .iter()
            .map(|a| AttachmentMeta {
                name: a.name.clone(),
                size: a.size,
                ts: referral.ts,
            })
            .collect();
        self.attachments.append_all(&referral.id, metas)?;

        tracing::info!(
            referral_id = %referral.id,
            attachments = referral.attach_names.len(),
            "Referral created"
        );
        Ok(referral)
    }

    pub fn set_status(&self, id: &str, status: ReferralStatus) -> Result<(), ReferralError> {
        let changed = self.referrals.mutate(|r| r.id == id, |r| r.status = status)?;
        if changed == 0 {
            return Err(ReferralError::NotFound { id: id.to_string() });
        }
        tracing::info!(referral_id = id, status = %status, "Referral status updated");
        Ok(())
    }

    /// Remove the referral. Its attachment metadata is left in place.
    pub fn delete(&self, id: &str) -> Result<(), ReferralError> {
        let removed = self.referrals.remove_where(|r| r.id == id)?;
        if removed == 0 {
            return Err(ReferralError::NotFound { id: id.to_string() });
        }
        tracing::info!(referral_id = id, "Referral deleted");
        Ok(())
    }
}

// ═══════════════════════════════════════════
// View types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRow {
    pub id: String,
    pub patient_name: String,
    pub receiving_facility: String,
    pub created_at: String,
    pub status: ReferralStatus,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralListView {
    pub rows: Vec<ReferralRow>,
    pub empty_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralDetail {
    pub id: String,
    pub patient_line: String,
    pub receiving_facility: String,
    pub reason: String,
    pub findings: String,
    pub status: ReferralStatus,
    pub status_options: Vec<ReferralStatus>,
    pub attachments: Vec<AttachmentRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRow {
    pub index: usize,
    pub name: String,
    pub size_kb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentsView {
    pub rows: Vec<AttachmentRow>,
    pub empty_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralPreview {
    pub id: String,
    pub patient_line: String,
    pub referral_date: String,
    pub receiving_facility: String,
    pub reason: String,
    pub findings: String,
    pub attachments: String,
}

/// Bytes to whole kilobytes, rounded half up.
pub fn size_kb(bytes: u64) -> u64 {
    (bytes + 512) / 1024
}

fn patient_line(referral: &Referral) -> String {
    format!(
        "{} ({} yrs, {})",
        referral.patient_name, referral.patient_age, referral.patient_sex
    )
}

/// Saved referrals, most recent first.
pub fn render_referral_list(referrals: &[Referral]) -> ReferralListView {
    let rows: Vec<ReferralRow> = referrals
        .iter()
        .rev()
        .map(|r| ReferralRow {
            id: r.id.clone(),
            patient_name: r.patient_name.clone(),
            receiving_facility: r.receiving_facility.clone(),
            created_at: format_timestamp(&r.ts),
            status: r.status,
            color: r.status.color().to_string(),
        })
        .collect();
    ReferralListView {
        empty_hint: rows.is_empty().then(|| NO_REFERRALS.to_string()),
        rows,
    }
}

/// Files staged on the form.
pub fn render_attachments(files: &[AttachmentUpload]) -> AttachmentsView {
    let rows: Vec<AttachmentRow> = files
        .iter()
        .enumerate()
        .map(|(index, f)| AttachmentRow {
            index,
            name: f.name.clone(),
            size_kb: size_kb(f.size),
        })
        .collect();
    AttachmentsView {
        empty_hint: rows.is_empty().then(|| NO_ATTACHMENTS.to_string()),
        rows,
    }
}

pub fn render_referral_detail(referral: &Referral, attachments: &[AttachmentMeta]) -> ReferralDetail {
    ReferralDetail {
        id: referral.id.clone(),
        patient_line: patient_line(referral),
        receiving_facility: referral.receiving_facility.clone(),
        reason: referral.reason.clone(),
        findings: referral.findings.clone(),
        status: referral.status,
        status_options: ReferralStatus::ALL.to_vec(),
        attachments: attachments
            .iter()
            .enumerate()
            .map(|(index, a)| AttachmentRow {
                index,
                name: a.name.clone(),
                size_kb: size_kb(a.size),
            })
            .collect(),
    }
}

/// Preview of a prepared, not yet saved, referral.
pub fn render_preview(referral: &Referral) -> ReferralPreview {
    ReferralPreview {
        id: referral.id.clone(),
        patient_line: patient_line(referral),
        referral_date: referral.date.format("%B %-d, %Y").to_string(),
        receiving_facility: referral.receiving_facility.clone(),
        reason: referral.reason.clone(),
        findings: referral.findings.clone(),
        attachments: if referral.attach_names.is_empty() {
            "None".to_string()
        } else {
            referral.attach_names.join(", ")
        },
    }
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn draft_for(date: &str) -> ReferralDraft {
        ReferralDraft {
            patient_name: "Latrel Angelo".into(),
            patient_age: "42".into(),
            patient_sex: "male".into(),
            date: date.into(),
            receiving_facility: "City Hospital".into(),
            reason: "Check-up".into(),
            findings: "Stable".into(),
            attachments: vec![],
        }
    }

    fn day(s: &str) -> NaiveDate {
        parse_form_date(s).unwrap()
    }

    // ── Id sequencing ──

    #[test]
    fn prefix_formats_date() {
        assert_eq!(referral_prefix(day("2025-01-05")), "REF-2025-01-05");
    }

    #[test]
    fn same_day_ids_increment() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        let first = repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        let second = repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();

        assert_eq!(first.id, "REF-2025-11-20-001");
        assert_eq!(second.id, "REF-2025-11-20-002");
        assert_eq!(first.status, ReferralStatus::Pending);
        assert_eq!(repo.list().len(), 2);
    }

    #[test]
    fn interleaved_dates_sequence_independently() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        let ids: Vec<String> = ["2025-11-20", "2025-11-21", "2025-11-20", "2025-11-21", "2025-11-20"]
            .iter()
            .map(|d| repo.create(&draft_for(d), Utc::now()).unwrap().id)
            .collect();
        assert_eq!(
            ids,
            vec![
                "REF-2025-11-20-001",
                "REF-2025-11-21-001",
                "REF-2025-11-20-002",
                "REF-2025-11-21-002",
                "REF-2025-11-20-003",
            ]
        );
    }

    #[test]
    fn next_id_skips_past_surviving_suffix_after_delete() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        for _ in 0..3 {
            repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        }
        repo.delete("REF-2025-11-20-001").unwrap();
        assert_eq!(repo.next_id(day("2025-11-20")), "REF-2025-11-20-004");
    }

    #[test]
    fn deleted_newest_id_is_not_reissued() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        let second = repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        repo.delete(&second.id).unwrap();

        let third = repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        assert_eq!(third.id, "REF-2025-11-20-003");
    }

    #[test]
    fn issued_mark_survives_deleting_every_referral_of_the_day() {
        let store = MemoryStore::shared();
        let repo = ReferralRepository::new(store.clone());
        let only = repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        repo.delete(&only.id).unwrap();

        let reopened = ReferralRepository::new(store);
        assert_eq!(reopened.next_id(day("2025-11-20")), "REF-2025-11-20-002");
        assert_eq!(reopened.next_id(day("2025-11-21")), "REF-2025-11-21-001");
    }

    #[test]
    fn huge_stored_suffix_does_not_overflow() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        let mut seeded = repo.prepare(&draft_for("2025-11-20"), Utc::now()).unwrap();
        seeded.id = "REF-2025-11-20-4294967295".into();
        repo.referrals.append(seeded).unwrap();
        assert_eq!(repo.next_id(day("2025-11-20")), "REF-2025-11-20-4294967296");

        let mut maxed = repo.prepare(&draft_for("2025-11-21"), Utc::now()).unwrap();
        maxed.id = format!("REF-2025-11-21-{}", u64::MAX);
        repo.referrals.append(maxed).unwrap();
        assert_eq!(
            repo.next_id(day("2025-11-21")),
            format!("REF-2025-11-21-{}", u64::MAX)
        );
    }

    #[test]
    fn next_id_on_empty_store() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        assert_eq!(repo.next_id(day("2024-02-29")), "REF-2024-02-29-001");
    }

    // ── Validation ──

    #[test]
    fn validation_lists_every_blank_field_and_writes_nothing() {
        let store = MemoryStore::shared();
        let repo = ReferralRepository::new(store.clone());
        let mut draft = draft_for("2025-11-20");
        draft.patient_age = "   ".into();
        draft.findings = String::new();

        match repo.create(&draft, Utc::now()) {
            Err(ReferralError::Validation { fields }) => {
                assert_eq!(fields, vec![ReferralField::PatientAge, ReferralField::Findings]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(store.get_raw(REFERRALS_KEY).unwrap().is_none());
        assert!(store.get_raw(ATTACHMENTS_KEY).unwrap().is_none());
    }

    #[test]
    fn empty_draft_reports_all_required_fields() {
        match validate_draft(&ReferralDraft::default()) {
            Err(ReferralError::Validation { fields }) => {
                assert_eq!(fields, ReferralField::REQUIRED.to_vec())
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_date_is_invalid_in_form_order() {
        let mut draft = draft_for("20/11/2025");
        draft.patient_name = String::new();
        draft.reason = String::new();
        match validate_draft(&draft) {
            Err(ReferralError::Validation { fields }) => assert_eq!(
                fields,
                vec![ReferralField::PatientName, ReferralField::Date, ReferralField::Reason]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_trims_values() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        let mut draft = draft_for(" 2025-11-20 ");
        draft.receiving_facility = "  Rural Health Unit ".into();
        let referral = repo.create(&draft, Utc::now()).unwrap();
        assert_eq!(referral.receiving_facility, "Rural Health Unit");
        assert_eq!(referral.date, day("2025-11-20"));
    }

    // ── Attachments ──

    #[test]
    fn attachments_stored_under_new_id() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        let mut draft = draft_for("2025-11-20");
        draft.attachments = vec![
            AttachmentUpload { name: "xray.png".into(), size: 2048 },
            AttachmentUpload { name: "labs.pdf".into(), size: 700 },
        ];
        let referral = repo.create(&draft, Utc::now()).unwrap();

        assert_eq!(referral.attach_names, vec!["xray.png", "labs.pdf"]);
        let metas = repo.attachments_for(&referral.id);
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].size, 2048);
        assert_eq!(metas[0].ts, referral.ts);
        assert_eq!(repo.get(&referral.id), Some(referral));
    }

    #[test]
    fn created_referral_matches_what_is_read_back() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        let now = DateTime::parse_from_rfc3339("2026-10-16T11:55:45.125750560Z")
            .unwrap()
            .with_timezone(&Utc);
        let referral = repo.create(&draft_for("2025-11-20"), now).unwrap();

        assert_eq!(referral.ts.timestamp_subsec_nanos(), 125_000_000);
        assert_eq!(repo.get(&referral.id), Some(referral));
    }

    #[test]
    fn delete_keeps_attachment_metadata() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        let mut draft = draft_for("2025-11-20");
        draft.attachments = vec![AttachmentUpload { name: "a.txt".into(), size: 1 }];
        let referral = repo.create(&draft, Utc::now()).unwrap();
        repo.delete(&referral.id).unwrap();
        assert!(repo.get(&referral.id).is_none());
        assert_eq!(repo.attachments_for(&referral.id).len(), 1);
    }

    // ── Status and delete ──

    #[test]
    fn set_status_updates_and_persists() {
        let store = MemoryStore::shared();
        let repo = ReferralRepository::new(store.clone());
        let referral = repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        repo.set_status(&referral.id, ReferralStatus::Scheduled).unwrap();

        let reopened = ReferralRepository::new(store);
        assert_eq!(
            reopened.get(&referral.id).map(|r| r.status),
            Some(ReferralStatus::Scheduled)
        );
    }

    #[test]
    fn unknown_id_is_not_found() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        assert!(matches!(
            repo.set_status("REF-x", ReferralStatus::Accepted),
            Err(ReferralError::NotFound { .. })
        ));
        assert!(matches!(repo.delete("REF-x"), Err(ReferralError::NotFound { .. })));
    }

    #[test]
    fn prepare_does_not_persist() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        let prepared = repo.prepare(&draft_for("2025-11-20"), Utc::now()).unwrap();
        assert_eq!(prepared.id, "REF-2025-11-20-001");
        assert!(repo.list().is_empty());
    }

    // ── Rendering ──

    #[test]
    fn list_renders_most_recent_first_with_colors() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        let second = repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        repo.set_status(&second.id, ReferralStatus::Rejected).unwrap();

        let view = render_referral_list(&repo.list());
        assert!(view.empty_hint.is_none());
        assert_eq!(view.rows[0].id, "REF-2025-11-20-002");
        assert_eq!(view.rows[0].color, "#C62828");
        assert_eq!(view.rows[1].color, "#F0A500");

        let empty = render_referral_list(&[]);
        assert_eq!(empty.empty_hint.as_deref(), Some(NO_REFERRALS));
    }

    #[test]
    fn attachment_sizes_round_to_kb() {
        assert_eq!(size_kb(0), 0);
        assert_eq!(size_kb(511), 0);
        assert_eq!(size_kb(512), 1);
        assert_eq!(size_kb(2048), 2);

        let view = render_attachments(&[AttachmentUpload { name: "x".into(), size: 1536 }]);
        assert_eq!(view.rows[0].size_kb, 2);
        assert_eq!(render_attachments(&[]).empty_hint.as_deref(), Some(NO_ATTACHMENTS));
    }

    #[test]
    fn detail_and_preview_text() {
        let repo = ReferralRepository::new(MemoryStore::shared());
        let mut draft = draft_for("2025-11-20");
        draft.attachments = vec![
            AttachmentUpload { name: "a.png".into(), size: 1 },
            AttachmentUpload { name: "b.png".into(), size: 1 },
        ];
        let prepared = repo.prepare(&draft, Utc::now()).unwrap();
        let preview = render_preview(&prepared);
        assert_eq!(preview.patient_line, "Latrel Angelo (42 yrs, male)");
        assert_eq!(preview.referral_date, "November 20, 2025");
        assert_eq!(preview.attachments, "a.png, b.png");

        let saved = repo.create(&draft_for("2025-11-20"), Utc::now()).unwrap();
        assert_eq!(render_preview(&saved).attachments, "None");
        let detail = render_referral_detail(&saved, &[]);
        assert_eq!(detail.status_options.len(), 4);
        assert_eq!(detail.status, ReferralStatus::Pending);
    }
}
