pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod fingerprint;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod retry;
pub mod source;
pub mod storage;
pub mod watch;

pub use context::ReconcileContext;
pub use reconcile::{reconcile, ReconciledBenchmarkView};
