//! ruraliq-core - Core library for RuralIQ field reporting
//!
//! This crate contains the report model, the durable offline report store,
//! connectivity tracking, and the sync coordinator used by the RuralIQ CLI and
//! any other client shell.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod sync;
pub mod util;

pub use connectivity::{ConnectivityMonitor, ConnectivityStatus, Subscription, Transition};
pub use error::{Error, Result};
pub use models::{ClientId, GeoPoint, Report, ReportDraft, SyncStatus};
pub use store::LocalReportStore;
pub use sync::{FlushReport, FlushStatus, SubmitOutcome, SyncCoordinator};
