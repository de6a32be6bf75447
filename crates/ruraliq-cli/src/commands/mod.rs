pub mod capture;
pub mod common;
pub mod history;
pub mod pending;
pub mod prune;
pub mod status;
pub mod sync;
pub mod watch;
