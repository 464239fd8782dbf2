//! Medicine persistence with file locking.
//!
//! Medicines live in a single JSON array. Reads take a shared lock; writes
//! go to a temp file in the same directory which is synced and renamed over
//! the original, so readers never see a half-written list.

use crate::persist::{self, SidecarLock};
use crate::{Error, Medicine, MedicineDraft, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Medicine store trait; the document store behind it is swappable
pub trait MedicineRepository {
    /// All medicines in insertion order
    fn list(&self) -> Result<Vec<Medicine>>;

    fn add(&mut self, draft: MedicineDraft, created_at: DateTime<Utc>) -> Result<Medicine>;

    /// Replace the editable fields of an existing medicine
    fn update(&mut self, id: Uuid, draft: MedicineDraft) -> Result<Medicine>;

    fn delete(&mut self, id: Uuid) -> Result<Medicine>;

    fn get(&self, id: Uuid) -> Result<Medicine> {
        self.list()?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Find a medicine by full id or unique id prefix
    fn resolve(&self, key: &str) -> Result<Medicine> {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return Err(Error::Validation("Medicine id must not be empty".into()));
        }

        let mut matches: Vec<Medicine> = self
            .list()?
            .into_iter()
            .filter(|m| m.id.to_string().starts_with(&key))
            .collect();

        match matches.len() {
            0 => Err(Error::NotFound(key)),
            1 => Ok(matches.remove(0)),
            n => Err(Error::Validation(format!(
                "Id prefix '{}' matches {} medicines",
                key, n
            ))),
        }
    }
}

/// JSON-file-backed medicine store
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    /// Create a repository for the given file (created on first write)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Repository at the standard location inside a data directory
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("medicines.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Medicine>> {
        if !self.path.exists() {
            tracing::debug!("No medicine file at {:?}, starting empty", self.path);
            return Ok(Vec::new());
        }

        let contents = persist::read_locked(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let medicines: Vec<Medicine> = serde_json::from_str(&contents).map_err(|e| {
            Error::State(format!(
                "Medicine file {:?} is corrupted: {}",
                self.path, e
            ))
        })?;
        tracing::debug!("Loaded {} medicines from {:?}", medicines.len(), self.path);
        Ok(medicines)
    }

    fn save(&self, medicines: &[Medicine]) -> Result<()> {
        persist::write_json_atomic(&self.path, medicines)?;
        tracing::debug!("Saved {} medicines to {:?}", medicines.len(), self.path);
        Ok(())
    }

    /// Load, modify and save back in one step
    ///
    /// Writers serialize on a sidecar lock file so concurrent processes
    /// cannot drop each other's changes.
    fn modify<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Medicine>) -> Result<T>,
    {
        let _lock = SidecarLock::acquire(&self.path)?;
        let mut medicines = self.load()?;
        let out = f(&mut medicines)?;
        self.save(&medicines)?;
        Ok(out)
    }
}

impl MedicineRepository for JsonFileRepository {
    fn list(&self) -> Result<Vec<Medicine>> {
        self.load()
    }

    fn add(&mut self, draft: MedicineDraft, created_at: DateTime<Utc>) -> Result<Medicine> {
        let medicine = Medicine::from_draft(draft, created_at)?;
        self.modify(|medicines| {
            medicines.push(medicine.clone());
            Ok(())
        })?;
        tracing::info!("Added medicine {} ({})", medicine.name, medicine.id);
        Ok(medicine)
    }

    fn update(&mut self, id: Uuid, draft: MedicineDraft) -> Result<Medicine> {
        draft.validate()?;
        let updated = self.modify(|medicines| {
            let medicine = medicines
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            medicine.apply(draft)?;
            Ok(medicine.clone())
        })?;
        tracing::info!("Updated medicine {} ({})", updated.name, updated.id);
        Ok(updated)
    }

    fn delete(&mut self, id: Uuid) -> Result<Medicine> {
        let removed = self.modify(|medicines| {
            let index = medicines
                .iter()
                .position(|m| m.id == id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            Ok(medicines.remove(index))
        })?;
        tracing::info!("Deleted medicine {} ({})", removed.name, removed.id);
        Ok(removed)
    }
}
