// src/extractors/mod.rs
pub mod archive;
pub mod dashboard;
pub mod datetime;
pub mod district_table;
pub mod feed;
pub mod field;
pub mod locator;
pub mod number;
pub mod press_release;

// Re-export key extraction types for convenience
pub use archive::{parse_archive, ArchiveLayout};
pub use dashboard::{parse_dashboard, parse_dashboard_timestamp, DashboardDateRule, DashboardRules, DashboardTemplate};
pub use district_table::{parse_district_table, DistrictTableRules};
pub use feed::parse_feed;
pub use field::{Field, FieldChain, FieldChains, OverrideKey, Strategy};
pub use number::NumberFormat;
pub use press_release::{parse_press_release, PressReleaseRules};
