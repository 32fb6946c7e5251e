use crate::config::PATIENTS_KEY;
use crate::db::store::SharedStore;
use crate::db::StorageError;
use crate::models::Patient;

use super::ListRepository;

/// Patients written to an empty registry on first use.
pub fn demo_patients() -> Vec<Patient> {
    vec![
        Patient::new("p1", "Latrel Angelo", "42", "male"),
        Patient::new("p2", "Steph Landicho", "35", "female"),
        Patient::new("p3", "Jay Albufera", "28", "male"),
    ]
}

/// Read-mostly patient reference data.
#[derive(Clone)]
pub struct PatientRegistry {
    repo: ListRepository<Patient>,
}

impl PatientRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self {
            repo: ListRepository::new(store, PATIENTS_KEY),
        }
    }

    /// Current registry; seeds the demo patients when the stored list is
    /// missing, unreadable or empty.
    pub fn load_or_seed(&self) -> Result<Vec<Patient>, StorageError> {
        let patients = self.repo.list();
        if !patients.is_empty() {
            return Ok(patients);
        }
        let seeded = demo_patients();
        self.repo.save(&seeded)?;
        tracing::info!(count = seeded.len(), "Seeded patient registry");
        Ok(seeded)
    }

    pub fn list(&self) -> Vec<Patient> {
        self.repo.list()
    }

    pub fn get(&self, id: &str) -> Option<Patient> {
        self.repo.find(|p| p.id == id)
    }

    /// Case-insensitive name match. An empty query returns everyone.
    pub fn search(&self, query: &str) -> Vec<Patient> {
        let needle = query.trim().to_lowercase();
        self.repo
            .list()
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect()
    }
}
