use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNTITLED: &str = "Untitled";
pub const ANONYMOUS_UPLOADER: &str = "Anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Video,
    Gallery,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Video => "video",
            ItemType::Gallery => "gallery",
        }
    }
}

/// One resolved video or image gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub kind: ItemType,
    pub webpage_url: String,
    /// Never empty; falls back to [`UNTITLED`].
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub uploader: Uploader,
    pub stats: Stats,
    /// Best first. Never empty on a successful extraction.
    pub formats: Vec<Format>,
    /// Gallery positions; empty for videos.
    pub entries: Vec<GalleryImage>,
    pub comments: Vec<Comment>,
}

impl MediaRecord {
    pub fn best_format(&self) -> Option<&Format> {
        self.formats.iter().max_by_key(|f| f.rank)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uploader {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
}

impl Uploader {
    pub fn anonymous() -> Self {
        Self {
            id: None,
            display_name: Some(ANONYMOUS_UPLOADER.to_string()),
            profile_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub duration_seconds: Option<u64>,
    pub view_count: Option<u64>,
    /// First eight characters of the date label once separators are stripped.
    /// Expected to read `YYYYMMDD` but never validated as a calendar date.
    pub upload_date: Option<String>,
}

/// One retrievable variant of an item. Ranks only compare within one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub url: String,
    pub format_id: String,
    /// Raw label as the site printed it ("1080", "hd", "SD", ...).
    pub quality_label: String,
    pub container_extension: String,
    pub rank: i64,
    pub required_headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub index: usize,
    pub formats: Vec<Format>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    None,
    Normal,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author_name: Option<String>,
    pub author_id: Option<String>,
    pub author_avatar_url: Option<String>,
    pub author_profile_url: Option<String>,
    pub author_membership_tier: MembershipTier,
    pub relative_time_text: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReference {
    pub target_url: String,
    pub item_type: ItemType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    UserUploads,
    UserPhotos,
    Channel,
    Playlist,
    Favorites,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub kind: CollectionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub succeeded: bool,
    pub display_name: Option<String>,
}
