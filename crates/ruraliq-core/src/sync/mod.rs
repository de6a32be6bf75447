//! Report synchronization with the remote ingestion server.
//!
//! [`SyncCoordinator`] sends captures directly while online and queues them in
//! the [`LocalReportStore`](crate::store::LocalReportStore) otherwise. Queued
//! reports are drained in one batch per flush; the server deduplicates by
//! client id, so resubmitting after a lost response is safe.

mod coordinator;
pub mod protocol;
mod transport;

#[cfg(test)]
mod test_helpers;

pub use coordinator::{FlushReport, FlushStatus, SubmitOutcome, SyncCoordinator};
pub use protocol::{BatchItem, BatchResponse, ItemVerdict, SubmitResponse, VerdictStatus};
pub use transport::{
    HttpReportTransport, ReportTransport, TransportError, TransportFuture, TransportResult,
};
