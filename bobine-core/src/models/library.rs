use serde::{Deserialize, Serialize};

use super::id::AssetId;

/// A browseable library as exposed to DLNA clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaLibrary {
    pub id: String,
    pub title: String,
    pub item_count: i64,
}

/// One playable item inside a library, with the attributes DIDL-Lite needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryItem {
    pub asset_id: AssetId,
    pub library_id: String,
    pub title: String,
    pub mime_type: String,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}
