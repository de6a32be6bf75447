//! Database layer for RuralIQ

mod connection;
mod migrations;
mod report_repository;

pub use connection::Database;
pub use report_repository::{LibSqlReportRepository, ReportRepository};
