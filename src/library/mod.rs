pub mod record;
pub mod store;

pub use record::{Availability, TrackRecord};
pub use store::{LibraryStore, SyncStats};
