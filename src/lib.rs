pub mod catalog;
pub mod config;
pub mod error;
pub mod library;
pub mod matcher;
pub mod spotify;
pub mod sync;
pub mod tidal;

pub use catalog::{DestinationCatalog, DestinationPlaylist, SourceCatalog, SourcePlaylist, SourceTrack};
pub use config::{Config, SyncTuning};
pub use error::{AppError, Result};
pub use library::{Availability, LibraryStore, SyncStats, TrackRecord};
pub use spotify::SpotifyClient;
pub use sync::{
    CheckpointStore, FileTransferLog, RunOptions, RunSummary, TransferEngine, TransferLog,
};
pub use tidal::TidalClient;
