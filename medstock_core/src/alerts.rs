//! Low-stock alerting.
//!
//! Each medicine alerts once when its projected stock falls under its
//! threshold. The medicines already alerted for are kept as an explicit
//! acknowledged set; a medicine leaves the set once it is no longer low
//! (e.g. after a restock), so it can alert again later.

use crate::persist::{self, SidecarLock};
use crate::{ProcessedMedicine, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use uuid::Uuid;

pub const ALERT_TITLE: &str = "Low Stock Alert";

/// Delivery channel for alerts (desktop notification, terminal, ...)
pub trait Notifier {
    fn notify(&mut self, title: &str, body: &str) -> Result<()>;
}

/// Persistent alert bookkeeping
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct AlertState {
    #[serde(default)]
    pub acknowledged: BTreeSet<Uuid>,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
}

/// Outcome of comparing projections against the acknowledged set
#[derive(Clone, Debug, Default)]
pub struct LowStockReport {
    /// Low and not yet alerted for, in projection order
    pub newly_low: Vec<ProcessedMedicine>,
    /// Acknowledged set to carry forward
    pub acknowledged: BTreeSet<Uuid>,
}

impl LowStockReport {
    /// Notification body, e.g. `"Time to restock: Insulin, Aspirin"`
    pub fn message(&self) -> Option<String> {
        if self.newly_low.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.newly_low.iter().map(|m| m.name()).collect();
        Some(format!("Time to restock: {}", names.join(", ")))
    }
}

/// Split low-stock medicines into newly low and already acknowledged
pub fn evaluate_low_stock(
    processed: &[ProcessedMedicine],
    acknowledged: &BTreeSet<Uuid>,
    default_threshold: f64,
) -> LowStockReport {
    let low: Vec<&ProcessedMedicine> = processed
        .iter()
        .filter(|m| m.is_low_stock(default_threshold))
        .collect();

    let newly_low: Vec<ProcessedMedicine> = low
        .iter()
        .filter(|m| !acknowledged.contains(&m.id()))
        .map(|m| (*m).clone())
        .collect();

    let still_low: BTreeSet<Uuid> = low.iter().map(|m| m.id()).collect();
    let next: BTreeSet<Uuid> = acknowledged
        .intersection(&still_low)
        .copied()
        .chain(newly_low.iter().map(|m| m.id()))
        .collect();

    LowStockReport {
        newly_low,
        acknowledged: next,
    }
}

/// Evaluate, notify about newly low medicines and record the check
pub fn run_low_stock_check<N: Notifier + ?Sized>(
    state: &mut AlertState,
    processed: &[ProcessedMedicine],
    default_threshold: f64,
    now: DateTime<Utc>,
    notifier: &mut N,
) -> Result<LowStockReport> {
    let report = evaluate_low_stock(processed, &state.acknowledged, default_threshold);

    if let Some(body) = report.message() {
        notifier.notify(ALERT_TITLE, &body)?;
        tracing::info!("Alerted for {} low-stock medicines", report.newly_low.len());
    }

    state.acknowledged = report.acknowledged.clone();
    state.last_check = Some(now);
    Ok(report)
}

impl AlertState {
    /// True when never checked or more than `interval` has passed
    pub fn is_check_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_check {
            None => true,
            Some(last) => now - last > interval,
        }
    }

    /// Load alert state from a file with shared locking
    ///
    /// Returns default state if the file doesn't exist or can't be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No alert state found, using default state");
            return Ok(Self::default());
        }

        let contents = match persist::read_locked(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(
                    "Unable to read alert state {:?}: {}. Using defaults.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        match serde_json::from_str::<AlertState>(&contents) {
            Ok(state) => {
                tracing::debug!("Loaded alert state from {:?}", path);
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse alert state {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save alert state atomically (temp file, fsync, rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        persist::write_json_atomic(path, self)?;
        tracing::debug!("Saved alert state to {:?}", path);
        Ok(())
    }

    /// Load, change and save alert state as one step
    ///
    /// Holds `<path>.lock` throughout, so two concurrent checks cannot both
    /// treat the same medicine as newly low.
    pub fn update<T, F>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut AlertState) -> Result<T>,
    {
        let _lock = SidecarLock::acquire(path)?;
        let mut state = Self::load(path)?;
        let out = f(&mut state)?;
        state.save(path)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dosage, Medicine};

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Vec<(String, String)>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&mut self, title: &str, body: &str) -> Result<()> {
            self.sent.push((title.into(), body.into()));
            Ok(())
        }
    }

    fn processed(name: &str, current_stock: f64, threshold: Option<f64>) -> ProcessedMedicine {
        ProcessedMedicine {
            medicine: Medicine {
                id: Uuid::new_v4(),
                name: name.into(),
                stock: 30,
                dosages: vec![Dosage::new("08:00".parse().unwrap(), 1.0)],
                created_at: Utc::now(),
                low_stock_threshold: threshold,
            },
            current_stock,
            end_date: None,
        }
    }

    #[test]
    fn test_newly_low_uses_per_medicine_threshold() {
        let meds = vec![
            processed("Insulin", 4.0, None),
            processed("Aspirin", 12.0, Some(15.0)),
            processed("Metformin", 25.0, None),
            processed("Statin", 3.0, Some(2.0)),
        ];

        let report = evaluate_low_stock(&meds, &BTreeSet::new(), 10.0);
        let names: Vec<&str> = report.newly_low.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["Insulin", "Aspirin"]);
        assert_eq!(report.acknowledged.len(), 2);
        assert_eq!(
            report.message().as_deref(),
            Some("Time to restock: Insulin, Aspirin")
        );
    }

    #[test]
    fn test_acknowledged_medicines_do_not_alert_again() {
        let meds = vec![processed("Insulin", 4.0, None)];
        let acknowledged: BTreeSet<Uuid> = meds.iter().map(|m| m.id()).collect();

        let report = evaluate_low_stock(&meds, &acknowledged, 10.0);
        assert!(report.newly_low.is_empty());
        assert!(report.message().is_none());
        assert_eq!(report.acknowledged, acknowledged);
    }

    #[test]
    fn test_recovered_medicines_leave_acknowledged_set() {
        let restocked = processed("Insulin", 40.0, None);
        let deleted = Uuid::new_v4();
        let acknowledged: BTreeSet<Uuid> = [restocked.id(), deleted].into_iter().collect();

        let report = evaluate_low_stock(&[restocked], &acknowledged, 10.0);
        assert!(report.acknowledged.is_empty());
    }

    #[test]
    fn test_check_notifies_once() {
        let meds = vec![processed("Insulin", 4.0, None), processed("Aspirin", 50.0, None)];
        let mut state = AlertState::default();
        let mut notifier = RecordingNotifier::default();
        let now = Utc::now();

        run_low_stock_check(&mut state, &meds, 10.0, now, &mut notifier).unwrap();
        run_low_stock_check(&mut state, &meds, 10.0, now, &mut notifier).unwrap();

        assert_eq!(notifier.sent.len(), 1);
        assert_eq!(notifier.sent[0].0, ALERT_TITLE);
        assert_eq!(notifier.sent[0].1, "Time to restock: Insulin");
        assert_eq!(state.last_check, Some(now));
        assert!(state.acknowledged.contains(&meds[0].id()));
    }

    #[test]
    fn test_check_due_after_interval() {
        let now = Utc::now();
        let interval = Duration::minutes(60);
        let mut state = AlertState::default();
        assert!(state.is_check_due(now, interval));

        state.last_check = Some(now - Duration::minutes(60));
        assert!(!state.is_check_due(now, interval));

        state.last_check = Some(now - Duration::minutes(61));
        assert!(state.is_check_due(now, interval));
    }

    #[test]
    fn test_state_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("alerts.json");

        let mut state = AlertState::default();
        state.acknowledged.insert(Uuid::new_v4());
        state.last_check = Some(Utc::now());
        state.save(&path).unwrap();

        assert_eq!(AlertState::load(&path).unwrap(), state);
    }

    #[test]
    fn test_corrupted_state_falls_back_to_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("alerts.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        assert_eq!(AlertState::load(&path).unwrap(), AlertState::default());
    }

    #[test]
    fn test_update_persists_changes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("alerts.json");
        let now = Utc::now();

        AlertState::update(&path, |state| {
            state.last_check = Some(now);
            Ok(())
        })
        .unwrap();

        assert_eq!(AlertState::load(&path).unwrap().last_check, Some(now));
    }

    #[test]
    fn test_concurrent_checks_alert_once() {
        use std::sync::{Arc, Mutex};
        use std::thread;

        struct SharedNotifier(Arc<Mutex<Vec<String>>>);

        impl Notifier for SharedNotifier {
            fn notify(&mut self, _title: &str, body: &str) -> Result<()> {
                self.0.lock().unwrap().push(body.to_string());
                Ok(())
            }
        }

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("alerts.json");
        let meds = vec![processed("Insulin", 4.0, None)];
        let sent = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let meds = meds.clone();
                let sent = Arc::clone(&sent);
                thread::spawn(move || {
                    let mut notifier = SharedNotifier(sent);
                    AlertState::update(&path, |state| {
                        run_low_stock_check(state, &meds, 10.0, Utc::now(), &mut notifier)
                    })
                    .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*sent.lock().unwrap(), vec!["Time to restock: Insulin".to_string()]);
    }
}
