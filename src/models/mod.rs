// src/models/mod.rs
pub mod documents;
pub mod records;

pub use documents::{DashboardSnapshot, DistrictTable};
pub use records::{report_date, PressReleaseRecord, ReportTimestamp, StatisticsRecord};
