//! Records browser: patient cards filtered by name, and the detail modal.

use serde::{Deserialize, Serialize};

use crate::models::Patient;

/// Placeholder notes shown in every patient detail.
pub const DEMO_NOTES: [&str; 3] = [
    "Nov 20, 2025 — Follow-up: Blood pressure stable.",
    "Oct 12, 2025 — Immunization given.",
    "Sep 01, 2025 — Initial consult.",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientCardView {
    pub id: String,
    pub name: String,
    pub meta: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDetailView {
    pub id: String,
    pub name: String,
    pub meta: String,
    pub notes: Vec<String>,
}

fn meta_items(patient: &Patient) -> Vec<String> {
    let mut items = vec![format!("ID: {}", patient.id)];
    if !patient.age.is_empty() {
        items.push(format!("{} yrs", patient.age));
    }
    if !patient.sex.is_empty() {
        items.push(patient.sex.clone());
    }
    items
}

/// Cards whose name contains `query`, case-insensitively. Blank shows all.
pub fn render_records(patients: &[Patient], query: &str) -> Vec<PatientCardView> {
    let needle = query.trim().to_lowercase();
    patients
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .map(|p| PatientCardView {
            id: p.id.clone(),
            name: p.name.clone(),
            meta: meta_items(p),
        })
        .collect()
}

pub fn render_patient_detail(patient: &Patient) -> PatientDetailView {
    PatientDetailView {
        id: patient.id.clone(),
        name: patient.name.clone(),
        meta: meta_items(patient).join(" • "),
        notes: DEMO_NOTES.iter().map(|n| n.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::demo_patients;

    #[test]
    fn search_filters_by_name() {
        let patients = demo_patients();
        assert_eq!(render_records(&patients, "").len(), 3);
        let hits = render_records(&patients, " LANDI ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p2");
        assert!(render_records(&patients, "nobody").is_empty());
    }

    #[test]
    fn detail_joins_meta() {
        let detail = render_patient_detail(&demo_patients()[0]);
        assert_eq!(detail.name, "Latrel Angelo");
        assert_eq!(detail.meta, "ID: p1 • 42 yrs • male");
        assert_eq!(detail.notes.len(), 3);
    }

    #[test]
    fn missing_age_and_sex_are_skipped() {
        let patient = Patient::new("x1", "Only Name", "", "");
        assert_eq!(render_patient_detail(&patient).meta, "ID: x1");
    }
}
