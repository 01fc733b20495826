pub mod checkpoint;
pub mod dedup;
pub mod engine;
pub mod limiter;
pub mod log;
pub mod report;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use checkpoint::{CheckpointStore, PlaylistCheckpoint, PlaylistStatus, RunCheckpoint, RunStatus};
pub use dedup::DuplicateDetector;
pub use engine::{RunOptions, TransferEngine};
pub use limiter::RateLimiter;
pub use log::{FileTransferLog, TransferLog};
pub use report::{PlaylistOutcome, PlaylistReport, RunSummary};
pub use resolver::TrackResolver;
