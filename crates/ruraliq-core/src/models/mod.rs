//! Data models for RuralIQ

mod report;

pub use report::{ClientId, GeoPoint, Report, ReportDraft, SyncStatus};
