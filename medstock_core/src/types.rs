//! Core domain types for medstock.
//!
//! - Dose times and dosages (the daily schedule)
//! - Medicines as stored, and drafts as edited by the user
//! - Projections of a medicine evaluated at an instant

use crate::{Error, Result};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Schedule Types
// ============================================================================

/// Wall-clock time of day at which a dose is taken
///
/// Parsed from `"HH:MM"` (a single-digit hour is accepted) and always
/// rendered zero-padded. Ordering is chronological.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoseTime {
    hour: u32,
    minute: u32,
}

impl DoseTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::Validation(format!(
                "Invalid time {}:{:02} (HH:MM)",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        // hour and minute are range-checked on construction
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for DoseTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("Invalid time '{}' (HH:MM)", s));

        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(hour) || hour.len() > 2 || !digits(minute) || minute.len() != 2 {
            return Err(invalid());
        }

        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for DoseTime {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DoseTime> for String {
    fn from(time: DoseTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for DoseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A recurring daily intake: `amount` units at `time`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dosage {
    pub time: DoseTime,
    pub amount: f64,
}

impl Dosage {
    pub fn new(time: DoseTime, amount: f64) -> Self {
        Self { time, amount }
    }
}

impl FromStr for Dosage {
    type Err = Error;

    /// Parse `HH:MM=AMOUNT`, e.g. `08:00=1.5`
    fn from_str(s: &str) -> Result<Self> {
        let (time, amount) = s.split_once('=').ok_or_else(|| {
            Error::Validation(format!("Invalid dosage '{}' (expected HH:MM=AMOUNT)", s))
        })?;
        let time: DoseTime = time.parse()?;
        let amount: f64 = amount
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("Invalid dosage amount '{}'", amount)))?;
        Ok(Self { time, amount })
    }
}

impl fmt::Display for Dosage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.amount, self.time)
    }
}

// ============================================================================
// Medicine Types
// ============================================================================

/// A tracked medicine as persisted
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    /// Stock on hand when the medicine was registered
    pub stock: u32,
    /// Schedule in insertion order
    pub dosages: Vec<Dosage>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub low_stock_threshold: Option<f64>,
}

impl Medicine {
    /// Build a new medicine from a validated draft
    pub fn from_draft(draft: MedicineDraft, created_at: DateTime<Utc>) -> Result<Self> {
        draft.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: draft.name.trim().to_string(),
            stock: draft.stock,
            dosages: draft.dosages,
            created_at,
            low_stock_threshold: draft.low_stock_threshold,
        })
    }

    /// Replace the user-editable fields, keeping id and creation time
    pub fn apply(&mut self, draft: MedicineDraft) -> Result<()> {
        draft.validate()?;
        self.name = draft.name.trim().to_string();
        self.stock = draft.stock;
        self.dosages = draft.dosages;
        self.low_stock_threshold = draft.low_stock_threshold;
        Ok(())
    }

    /// The editable fields of this medicine, as a starting point for edits
    pub fn to_draft(&self) -> MedicineDraft {
        MedicineDraft {
            name: self.name.clone(),
            stock: self.stock,
            dosages: self.dosages.clone(),
            low_stock_threshold: self.low_stock_threshold,
        }
    }
}

/// User-supplied fields of a medicine, checked before they reach the store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicineDraft {
    pub name: String,
    pub stock: u32,
    pub dosages: Vec<Dosage>,
    #[serde(default)]
    pub low_stock_threshold: Option<f64>,
}

impl MedicineDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().chars().count() < 2 {
            return Err(Error::Validation(
                "Name must be at least 2 characters.".into(),
            ));
        }
        if self.stock < 1 {
            return Err(Error::Validation(
                "Initial stock must be at least 1.".into(),
            ));
        }
        if self.dosages.is_empty() {
            return Err(Error::Validation(
                "At least one dosage schedule is required.".into(),
            ));
        }
        for dosage in &self.dosages {
            if !dosage.amount.is_finite() || dosage.amount <= 0.0 {
                return Err(Error::Validation(format!(
                    "Dosage amount at {} must be > 0",
                    dosage.time
                )));
            }
        }
        if let Some(threshold) = self.low_stock_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(Error::Validation(
                    "Low stock threshold must be >= 0".into(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Projection Types
// ============================================================================

/// Stock remaining at an instant and the predicted depletion instant
#[derive(Clone, Debug, PartialEq)]
pub struct Projection<Tz: chrono::TimeZone> {
    pub current_stock: f64,
    /// `None` when already depleted or no depletion within the horizon
    pub end_date: Option<DateTime<Tz>>,
}

/// A medicine together with its projection at some `now`
#[derive(Clone, Debug)]
pub struct ProcessedMedicine {
    pub medicine: Medicine,
    pub current_stock: f64,
    pub end_date: Option<DateTime<Utc>>,
}

impl ProcessedMedicine {
    pub fn id(&self) -> Uuid {
        self.medicine.id
    }

    pub fn name(&self) -> &str {
        &self.medicine.name
    }

    /// Threshold in effect for this medicine
    pub fn threshold(&self, default_threshold: f64) -> f64 {
        self.medicine.low_stock_threshold.unwrap_or(default_threshold)
    }

    pub fn is_low_stock(&self, default_threshold: f64) -> bool {
        self.current_stock < self.threshold(default_threshold)
    }

    /// Current stock as a percentage of the initial stock
    pub fn stock_percentage(&self) -> f64 {
        if self.medicine.stock > 0 {
            self.current_stock / f64::from(self.medicine.stock) * 100.0
        } else {
            0.0
        }
    }

    /// Whole units left, for display
    pub fn whole_units(&self) -> u64 {
        self.current_stock.floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> MedicineDraft {
        MedicineDraft {
            name: "Insulin".into(),
            stock: 30,
            dosages: vec![Dosage::new("08:00".parse().unwrap(), 1.0)],
            low_stock_threshold: None,
        }
    }

    #[test]
    fn test_dose_time_parsing() {
        let t: DoseTime = "08:30".parse().unwrap();
        assert_eq!((t.hour(), t.minute()), (8, 30));
        assert_eq!(t.minutes_since_midnight(), 510);

        let single: DoseTime = "7:05".parse().unwrap();
        assert_eq!(single.to_string(), "07:05");

        for bad in ["24:00", "12:60", "12:5", "ab:cd", "1200", "", "123:00", "-1:00"] {
            assert!(bad.parse::<DoseTime>().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_dose_time_orders_chronologically() {
        let mut times: Vec<DoseTime> = ["20:00", "9:15", "08:00", "13:45"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        times.sort();
        let rendered: Vec<String> = times.iter().map(|t| t.to_string()).collect();
        assert_eq!(rendered, vec!["08:00", "09:15", "13:45", "20:00"]);
    }

    #[test]
    fn test_dose_time_serde_as_string() {
        let dosage = Dosage::new("9:00".parse().unwrap(), 2.0);
        let json = serde_json::to_string(&dosage).unwrap();
        assert_eq!(json, r#"{"time":"09:00","amount":2.0}"#);

        let err = serde_json::from_str::<Dosage>(r#"{"time":"25:00","amount":1}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_dosage_from_str() {
        let d: Dosage = "20:30=0.5".parse().unwrap();
        assert_eq!(d.time.to_string(), "20:30");
        assert_eq!(d.amount, 0.5);

        assert!("20:30".parse::<Dosage>().is_err());
        assert!("20:30=lots".parse::<Dosage>().is_err());
    }

    #[test]
    fn test_draft_validation() {
        assert!(draft().validate().is_ok());

        let mut short_name = draft();
        short_name.name = " A ".into();
        assert!(short_name.validate().is_err());

        let mut no_stock = draft();
        no_stock.stock = 0;
        assert!(no_stock.validate().is_err());

        let mut no_dosages = draft();
        no_dosages.dosages.clear();
        assert!(no_dosages.validate().is_err());

        let mut zero_amount = draft();
        zero_amount.dosages[0].amount = 0.0;
        assert!(zero_amount.validate().is_err());

        let mut nan_amount = draft();
        nan_amount.dosages[0].amount = f64::NAN;
        assert!(nan_amount.validate().is_err());

        let mut negative_threshold = draft();
        negative_threshold.low_stock_threshold = Some(-1.0);
        assert!(negative_threshold.validate().is_err());
    }

    #[test]
    fn test_apply_keeps_identity() {
        let created = Utc::now();
        let mut medicine = Medicine::from_draft(draft(), created).unwrap();
        let id = medicine.id;

        let mut edit = medicine.to_draft();
        edit.name = "  Metformin ".into();
        edit.stock = 60;
        medicine.apply(edit).unwrap();

        assert_eq!(medicine.id, id);
        assert_eq!(medicine.created_at, created);
        assert_eq!(medicine.name, "Metformin");
        assert_eq!(medicine.stock, 60);
    }

    #[test]
    fn test_processed_medicine_helpers() {
        let medicine = Medicine::from_draft(draft(), Utc::now()).unwrap();
        let processed = ProcessedMedicine {
            medicine,
            current_stock: 7.5,
            end_date: None,
        };
        assert_eq!(processed.whole_units(), 7);
        assert!((processed.stock_percentage() - 25.0).abs() < 1e-9);
        assert!(processed.is_low_stock(10.0));
        assert!(!processed.is_low_stock(5.0));
    }
}
