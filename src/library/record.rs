use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a source track is known to exist in the destination catalog.
///
/// Serialized as explicit tokens so a record always states its search
/// history: `"unset"` means never searched, `"false"` searched and missing,
/// `"true"` searched and mapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    #[default]
    #[serde(rename = "unset")]
    Unknown,
    #[serde(rename = "false")]
    Unavailable,
    #[serde(rename = "true")]
    Available,
}

/// One row of the cross-platform track library, keyed by source track id.
///
/// Records are never deleted; playlist memberships only grow, and the
/// resolution fields are touched only when a search actually ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    pub source_id: String,
    pub destination_id: Option<String>,
    pub name: String,
    pub primary_artist: String,
    pub album: String,
    pub playlist_ids: BTreeSet<String>,
    pub destination_availability: Availability,
    pub last_resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

impl TrackRecord {
    pub fn new(source_id: &str, name: &str, primary_artist: &str, album: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            destination_id: None,
            name: name.to_string(),
            primary_artist: primary_artist.to_string(),
            album: album.to_string(),
            playlist_ids: BTreeSet::new(),
            destination_availability: Availability::Unknown,
            last_resolved_at: None,
            notes: String::new(),
        }
    }

    /// True when the resolver still has work to do for this record: never
    /// searched, or marked available without a destination id (repair case).
    pub fn needs_resolution(&self) -> bool {
        match self.destination_availability {
            Availability::Unknown => true,
            Availability::Available => self.destination_id.is_none(),
            Availability::Unavailable => false,
        }
    }
}
