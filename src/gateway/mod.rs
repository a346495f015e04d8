//! Resource Gateway
//!
//! The remote file-manager API is the only place anything is stored. This
//! module describes it as one trait, `ResourceGateway`, with one method per
//! endpoint, so the list controller can be driven against the real HTTP
//! implementation or an in-memory one in tests.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          ResourceGateway Trait              │
//! │ list, search, mutate, upload, share, ...    │
//! └─────────────────────────────────────────────┘
//!                      │
//!            ┌─────────┴─────────┐
//!            ▼                   ▼
//!      ┌───────────┐     ┌──────────────┐
//!      │HttpGateway│     │MemoryGateway │ (tests)
//!      └───────────┘     └──────────────┘
//! ```

pub mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod memory;

pub use http::HttpGateway;
pub use types::*;

use async_trait::async_trait;
use secrecy::SecretString;
use std::path::Path;

use crate::error::ClientError;

/// Trash / restore / permanent delete, for files and folders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    TrashFile,
    RestoreFile,
    DeleteFile,
    TrashFolder,
    RestoreFolder,
    DeleteFolder,
}

/// HTTP verb of a mutation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMethod {
    Post,
    Delete,
}

impl MutationKind {
    pub fn method(&self) -> MutationMethod {
        match self {
            MutationKind::RestoreFile | MutationKind::RestoreFolder => MutationMethod::Post,
            _ => MutationMethod::Delete,
        }
    }

    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            MutationKind::TrashFile | MutationKind::RestoreFile | MutationKind::DeleteFile => {
                ResourceKind::File
            }
            _ => ResourceKind::Folder,
        }
    }

    /// Endpoint path for the given entry, with the id percent-encoded
    pub fn path(&self, entry_id: &str) -> String {
        let collection = match self.resource_kind() {
            ResourceKind::File => "files",
            ResourceKind::Folder => "folders",
        };
        let id = urlencoding::encode(entry_id);
        match self {
            MutationKind::TrashFile | MutationKind::TrashFolder => format!("/{}/{}", collection, id),
            MutationKind::RestoreFile | MutationKind::RestoreFolder => {
                format!("/{}/{}/restore", collection, id)
            }
            MutationKind::DeleteFile | MutationKind::DeleteFolder => {
                format!("/{}/{}/permanent", collection, id)
            }
        }
    }

    /// Past-tense label for log lines and CLI output
    pub fn describe(&self) -> &'static str {
        match self {
            MutationKind::TrashFile | MutationKind::TrashFolder => "trashed",
            MutationKind::RestoreFile | MutationKind::RestoreFolder => "restored",
            MutationKind::DeleteFile | MutationKind::DeleteFolder => "permanently deleted",
        }
    }
}

/// A file ready to be sent as multipart form data
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            bytes,
            mime_type,
        }
    }

    /// Read a local file into memory, guessing its content type from the name
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Validation(format!("Not a file path: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, bytes))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// True for RFC 4122 UUIDs of versions 1 through 5.
///
/// The upload endpoint only accepts a `folder_id` of that shape; anything
/// else is left out of the form and the file lands in the root.
pub fn is_rfc4122_uuid(value: &str) -> bool {
    // Hyphenated form only
    if value.len() != 36 {
        return false;
    }
    match uuid::Uuid::parse_str(value) {
        Ok(id) => {
            matches!(id.get_version_num(), 1..=5) && id.get_variant() == uuid::Variant::RFC4122
        }
        Err(_) => false,
    }
}

/// Unified gateway trait
///
/// Every call takes the bearer token explicitly: the token belongs to the
/// session provider and is resolved again for each request.
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    /// Human readable name of the backend (base URL for HTTP)
    fn display_name(&self) -> String;

    /// `GET /folders`
    async fn list_folders(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FolderEntry>, ClientError>;

    /// `GET /files`
    async fn list_files(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FileEntry>, ClientError>;

    /// `GET /folders/trash`
    async fn list_trashed_folders(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FolderEntry>, ClientError>;

    /// `GET /files/trash`
    async fn list_trashed_files(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FileEntry>, ClientError>;

    /// `GET /search`, folders and files in one response
    async fn search(
        &self,
        token: &SecretString,
        query: &SearchQuery,
    ) -> Result<SearchResults, ClientError>;

    /// `GET /folders/{id}`
    async fn folder(&self, token: &SecretString, folder_id: &str) -> Result<FolderEntry, ClientError>;

    /// `GET /folders/{id}/breadcrumbs`, ordered from the top of the tree
    async fn breadcrumbs(
        &self,
        token: &SecretString,
        folder_id: &str,
    ) -> Result<Vec<Breadcrumb>, ClientError>;

    /// `POST /folders`
    async fn create_folder(
        &self,
        token: &SecretString,
        name: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<FolderEntry, ClientError>;

    /// Trash, restore or permanently delete an entry
    async fn mutate(
        &self,
        token: &SecretString,
        kind: MutationKind,
        entry_id: &str,
    ) -> Result<(), ClientError>;

    /// `POST /files/upload`
    async fn upload_file(
        &self,
        token: &SecretString,
        upload: &FileUpload,
        folder_id: Option<&str>,
    ) -> Result<(), ClientError>;

    /// `POST /files/{id}/new-version`
    async fn upload_new_version(
        &self,
        token: &SecretString,
        file_id: &str,
        upload: &FileUpload,
    ) -> Result<(), ClientError>;

    /// `GET /files/{id}/versions`
    async fn list_versions(
        &self,
        token: &SecretString,
        file_id: &str,
    ) -> Result<Vec<FileVersion>, ClientError>;

    /// `GET /files/versions/{id}/download`, streamed to `local_path`.
    /// Returns the number of bytes written.
    async fn download_version(
        &self,
        token: &SecretString,
        version_id: &str,
        local_path: &Path,
        on_progress: Option<Box<dyn Fn(u64, u64) + Send>>,
    ) -> Result<u64, ClientError>;

    /// `GET /files/storage/usage`
    async fn storage_usage(&self, token: &SecretString) -> Result<StorageUsage, ClientError>;

    /// `POST /share/link`, returns the link
    async fn create_share_link(
        &self,
        token: &SecretString,
        request: &ShareRequest,
    ) -> Result<String, ClientError>;

    /// `GET /share/access/{id}`; works without a session for public links
    async fn access_share(
        &self,
        token: Option<&SecretString>,
        share_id: &str,
    ) -> Result<SharedResource, ClientError>;
}
