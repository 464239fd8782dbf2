#![forbid(unsafe_code)]

//! Core domain model and business logic for medstock.
//!
//! This crate provides:
//! - Domain types (dose times, dosages, medicines, projections)
//! - Stock projection (remaining stock and depletion date)
//! - Presentation helpers for end dates
//! - Persistence (JSON medicine store, alert state)
//! - Low-stock alerting and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod projection;
pub mod format;
mod persist;
pub mod store;
pub mod alerts;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use projection::{
    compute_current_stock, compute_end_date, project, project_all, MAX_PROJECTION_DAYS,
};
pub use format::{format_distance, format_end_date};
pub use store::{JsonFileRepository, MedicineRepository};
pub use alerts::{evaluate_low_stock, run_low_stock_check, AlertState, LowStockReport, Notifier};
