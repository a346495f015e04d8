//! Shared types for the resource gateway
//!
//! Wire payloads returned by the file-manager API plus the query structs the
//! controller hands to the gateway.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort key accepted by the listing and search endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Size,
    Date,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Size => "size",
            SortField::Date => "date",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folder as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Trash listings do not carry this; the controller stamps it
    #[serde(default)]
    pub trashed: bool,
}

/// File as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub trashed: bool,
}

impl FileEntry {
    /// Lowercased extension without the dot, if the name has one
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Unified list entry, folders and files side by side
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "resource_type", rename_all = "lowercase")]
pub enum ResourceEntry {
    Folder(FolderEntry),
    File(FileEntry),
}

impl ResourceEntry {
    pub fn id(&self) -> &str {
        match self {
            ResourceEntry::Folder(f) => &f.id,
            ResourceEntry::File(f) => &f.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceEntry::Folder(f) => &f.name,
            ResourceEntry::File(f) => &f.name,
        }
    }

    pub fn is_trashed(&self) -> bool {
        match self {
            ResourceEntry::Folder(f) => f.trashed,
            ResourceEntry::File(f) => f.trashed,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, ResourceEntry::Folder(_))
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceEntry::Folder(_) => ResourceKind::Folder,
            ResourceEntry::File(_) => ResourceKind::File,
        }
    }

    pub(crate) fn mark_trashed(&mut self) {
        match self {
            ResourceEntry::Folder(f) => f.trashed = true,
            ResourceEntry::File(f) => f.trashed = true,
        }
    }
}

/// Query for the folder/file listing endpoints (standard and trash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// `None` lists the root
    pub folder_id: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub limit: u32,
    pub offset: u32,
}

/// Query for the unified search endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub folder_id: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub limit: u32,
    pub offset: u32,
}

/// `GET /search` payload: matching folders and files in one response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub folders: Vec<FolderEntry>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// One ancestor in a folder path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub id: String,
    pub name: String,
}

impl Breadcrumb {
    /// Synthetic crumb standing for the top of the tree
    pub fn root() -> Self {
        Self {
            id: "dashboard".to_string(),
            name: "Dashboard".to_string(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == "dashboard"
    }
}

/// Stored version of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileVersion {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Storage quota as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    /// Bytes used
    pub used: u64,
    /// Quota in bytes
    pub max: u64,
    /// Percentage used (0-100)
    pub percent: f64,
}

/// Coarse fill level of the quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLevel {
    Normal,
    High,
    Critical,
}

impl StorageUsage {
    pub fn level(&self) -> UsageLevel {
        if self.percent < 70.0 {
            UsageLevel::Normal
        } else if self.percent < 90.0 {
            UsageLevel::High
        } else {
            UsageLevel::Critical
        }
    }

    pub fn used_mb(&self) -> f64 {
        self.used as f64 / 1024.0 / 1024.0
    }

    pub fn max_mb(&self) -> f64 {
        self.max as f64 / 1024.0 / 1024.0
    }
}

/// What a share link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Folder,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::File => write!(f, "file"),
            ResourceKind::Folder => write!(f, "folder"),
        }
    }
}

/// Permission granted through a share link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    #[default]
    Viewer,
    Editor,
}

/// `POST /share/link` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareRequest {
    pub resource_id: String,
    pub resource_type: ResourceKind,
    pub role: ShareRole,
}

/// The shared resource itself, as much as the API exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedResourceBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Download URL, files only
    #[serde(default)]
    pub url: Option<String>,
}

/// `GET /share/access/{id}` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedResource {
    pub resource: SharedResourceBody,
    pub role: ShareRole,
    pub resource_type: ResourceKind,
}

impl SharedResource {
    /// Download URL when the share points at a file
    pub fn download_url(&self) -> Option<&str> {
        match self.resource_type {
            ResourceKind::File => self.resource.url.as_deref(),
            ResourceKind::Folder => None,
        }
    }
}
