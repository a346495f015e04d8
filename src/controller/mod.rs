//! List State Controller
//!
//! Owns the browsing state of the file manager: which folder, search, sort and
//! trash view is active, the entries loaded so far, and the pagination cursor.
//! Every fetch is stamped with the epoch it was issued in; the state lock is
//! released for the network round-trip and a response only lands if nothing
//! invalidated the list meanwhile.

pub mod state;

pub use state::{
    FetchedPage, ListState, LoadPhase, PageApply, PageCursor, PageRequest, ScrollMetrics,
    ViewCoordinates,
};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::gateway::{
    is_rfc4122_uuid, Breadcrumb, FileUpload, FileVersion, FolderEntry, MutationKind,
    ResourceEntry, ResourceGateway, ResourceKind, ShareRequest, ShareRole, SharedResource,
    SortField, SortOrder, StorageUsage,
};
use crate::media::MediaType;
use crate::session::SessionProvider;

/// What a fetch attempt ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// No session; nothing was requested
    Skipped,
    /// No page owed, or one is already in flight
    NothingToLoad,
    /// The list was invalidated while the request was out; result dropped
    Stale,
    Applied { received: usize, has_more: bool },
}

/// Per-file result of a batch upload
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<(String, ClientError)>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Where the list currently is in the folder tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderLocation {
    /// `None` at the root
    pub current: Option<FolderEntry>,
    /// Root crumb first; empty when the trail could not be loaded
    pub trail: Vec<Breadcrumb>,
}

/// Background task keeping the list in step with the session.
/// Dropping it stops the task.
pub struct SessionFollower {
    handle: JoinHandle<()>,
}

impl SessionFollower {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SessionFollower {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct ListController {
    gateway: Arc<dyn ResourceGateway>,
    session: Arc<dyn SessionProvider>,
    state: RwLock<ListState>,
    near_end_threshold: f64,
}

impl ListController {
    pub fn new(
        gateway: Arc<dyn ResourceGateway>,
        session: Arc<dyn SessionProvider>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            gateway,
            session,
            state: RwLock::new(ListState::new(config.page_limit)),
            near_end_threshold: config.near_end_threshold,
        }
    }

    pub fn gateway_name(&self) -> String {
        self.gateway.display_name()
    }

    async fn token(&self) -> Option<SecretString> {
        self.session
            .session()
            .await
            .map(|s| s.access_token)
            .filter(|t| !t.expose_secret().trim().is_empty())
    }

    async fn require_token(&self) -> Result<SecretString, ClientError> {
        self.token().await.ok_or(ClientError::AuthMissing)
    }

    // ============ State access ============

    /// Copy of the whole state
    pub async fn snapshot(&self) -> ListState {
        self.state.read().await.clone()
    }

    pub async fn coordinates(&self) -> ViewCoordinates {
        self.state.read().await.coords.clone()
    }

    pub async fn cursor(&self) -> PageCursor {
        self.state.read().await.cursor
    }

    pub async fn phase(&self) -> LoadPhase {
        self.state.read().await.phase.clone()
    }

    /// Everything loaded for the current epoch, unfiltered
    pub async fn entries(&self) -> Vec<ResourceEntry> {
        self.state.read().await.entries.clone()
    }

    /// Loaded entries after the media-type filter
    pub async fn visible_entries(&self) -> Vec<ResourceEntry> {
        self.state.read().await.visible_entries()
    }

    // ============ Coordinates ============

    async fn update_coords(&self, what: &str, update: impl FnOnce(&mut ViewCoordinates)) -> bool {
        let mut state = self.state.write().await;
        let changed = state.update_coords(update);
        if changed {
            debug!("{} changed, list invalidated (epoch {})", what, state.epoch);
        }
        changed
    }

    /// Open a folder (`None` for the root). Returns whether the list was invalidated.
    pub async fn set_folder(&self, folder_id: Option<&str>) -> bool {
        let folder_id = ViewCoordinates::normalize_folder_id(folder_id);
        self.update_coords("Folder", |c| c.folder_id = folder_id).await
    }

    pub async fn set_search_term(&self, term: &str) -> bool {
        let term = term.to_string();
        self.update_coords("Search term", |c| c.search_term = term).await
    }

    pub async fn set_sort(&self, sort: SortField) -> bool {
        self.update_coords("Sort field", |c| c.sort = sort).await
    }

    pub async fn set_order(&self, order: SortOrder) -> bool {
        self.update_coords("Sort order", |c| c.order = order).await
    }

    pub async fn set_viewing_trash(&self, viewing_trash: bool) -> bool {
        self.update_coords("Trash view", |c| c.viewing_trash = viewing_trash).await
    }

    /// Local filter; never invalidates or fetches
    pub async fn set_media_type(&self, media_type: MediaType) -> bool {
        self.update_coords("Media type", |c| c.media_type = media_type).await
    }

    /// Replace all coordinates at once
    pub async fn navigate(&self, coords: ViewCoordinates) -> bool {
        let mut coords = coords;
        coords.folder_id = ViewCoordinates::normalize_folder_id(coords.folder_id.as_deref());
        self.update_coords("View", |c| *c = coords).await
    }

    /// Empty the list and start a new epoch
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.invalidate();
        debug!("List invalidated (epoch {})", state.epoch);
    }

    // ============ Fetching ============

    /// Fetch the page the cursor points at for the current coordinates
    pub async fn fetch_page(&self) -> Result<FetchOutcome, ClientError> {
        let Some(token) = self.token().await else {
            debug!("No session, skipping page fetch");
            return Ok(FetchOutcome::Skipped);
        };
        let request = self.state.write().await.begin_fetch();
        self.run_fetch(&token, request).await
    }

    /// Move the cursor to the next page, see `ListState::advance_page`
    pub async fn advance_page(&self) -> bool {
        self.state.write().await.advance_page()
    }

    /// Advance and fetch, or re-request a page whose fetch failed
    pub async fn load_more(&self) -> Result<FetchOutcome, ClientError> {
        let Some(token) = self.token().await else {
            return Ok(FetchOutcome::Skipped);
        };

        let request = {
            let mut state = self.state.write().await;
            state.advance_page();
            if state.pending_page().is_none() || state.phase == LoadPhase::Loading {
                return Ok(FetchOutcome::NothingToLoad);
            }
            state.begin_fetch()
        };
        self.run_fetch(&token, request).await
    }

    /// Scroll callback: loads the next page once the end is within reach
    pub async fn on_near_end(&self, metrics: ScrollMetrics) -> Result<FetchOutcome, ClientError> {
        if !metrics.is_near_end(self.near_end_threshold) {
            return Ok(FetchOutcome::NothingToLoad);
        }
        self.load_more().await
    }

    /// Invalidate and fetch page 1 again
    pub async fn refresh(&self) -> Result<FetchOutcome, ClientError> {
        self.invalidate().await;
        self.fetch_page().await
    }

    async fn run_fetch(
        &self,
        token: &SecretString,
        request: PageRequest,
    ) -> Result<FetchOutcome, ClientError> {
        debug!(
            "Fetching page {} (epoch {}, offset {})",
            request.page,
            request.epoch,
            request.offset()
        );
        let result = self.query_page(token, &request).await;

        let mut state = self.state.write().await;
        match result {
            Ok(page) => match state.apply_page(&request, page) {
                PageApply::Applied { received, has_more } => {
                    info!(
                        "Loaded page {}: {} entries (has_more={})",
                        request.page, received, has_more
                    );
                    Ok(FetchOutcome::Applied { received, has_more })
                }
                PageApply::Stale => {
                    debug!(
                        "Dropping stale page {} from epoch {} (current epoch {})",
                        request.page, request.epoch, state.epoch
                    );
                    Ok(FetchOutcome::Stale)
                }
            },
            Err(e) => {
                if state.fail_fetch(&request, e.to_string()) {
                    warn!("Failed to load page {}: {}", request.page, e);
                    Err(e)
                } else {
                    debug!("Ignoring failure of stale page {}: {}", request.page, e);
                    Ok(FetchOutcome::Stale)
                }
            }
        }
    }

    async fn query_page(
        &self,
        token: &SecretString,
        request: &PageRequest,
    ) -> Result<FetchedPage, ClientError> {
        if let Some(query) = request.search_query() {
            let results = self.gateway.search(token, &query).await?;
            return Ok(FetchedPage {
                folders: results.folders,
                files: results.files,
                from_trash: false,
            });
        }

        let query = request.listing_query();
        let from_trash = request.coords.viewing_trash;
        let (folders, files) = if from_trash {
            tokio::try_join!(
                self.gateway.list_trashed_folders(token, &query),
                self.gateway.list_trashed_files(token, &query)
            )?
        } else {
            tokio::try_join!(
                self.gateway.list_folders(token, &query),
                self.gateway.list_files(token, &query)
            )?
        };

        Ok(FetchedPage {
            folders,
            files,
            from_trash,
        })
    }

    // ============ Mutations ============

    /// Trash, restore or permanently delete an entry, then refresh.
    /// A failed mutation leaves the list untouched.
    pub async fn apply_mutation(
        &self,
        kind: MutationKind,
        entry_id: &str,
    ) -> Result<FetchOutcome, ClientError> {
        let token = self.require_token().await?;
        if let Err(e) = self.gateway.mutate(&token, kind, entry_id).await {
            warn!("Failed to update {} {}: {}", kind.resource_kind(), entry_id, e);
            return Err(e);
        }
        info!("{} {} {}", kind.resource_kind(), entry_id, kind.describe());
        self.refresh().await
    }

    /// Create a folder in the current one and open it
    pub async fn create_folder(&self, name: &str) -> Result<FolderEntry, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Validation("Folder name cannot be empty".to_string()));
        }
        let token = self.require_token().await?;
        let parent = self.state.read().await.coords.folder_id.clone();

        let created = self
            .gateway
            .create_folder(&token, name, parent.as_deref())
            .await?;
        info!("Created folder {} ({})", created.name, created.id);

        let id = created.id.clone();
        self.update_coords("Folder", |c| {
            c.folder_id = Some(id);
            c.viewing_trash = false;
        })
        .await;
        Ok(created)
    }

    /// Upload files one after another into the current folder
    pub async fn upload(&self, uploads: Vec<FileUpload>) -> Result<UploadReport, ClientError> {
        self.require_token().await?;

        let folder_id = self.state.read().await.coords.folder_id.clone();
        let target = folder_id.as_deref().filter(|id| is_rfc4122_uuid(id));
        if let (Some(id), None) = (folder_id.as_deref(), target) {
            debug!("Folder id {} is not a UUID, uploading without folder_id", id);
        }

        let mut report = UploadReport::default();
        for upload in &uploads {
            let Some(token) = self.token().await else {
                report.failed.push((upload.file_name.clone(), ClientError::AuthMissing));
                continue;
            };

            match self.gateway.upload_file(&token, upload, target).await {
                Ok(()) => {
                    info!("Uploaded {} ({} bytes)", upload.file_name, upload.len());
                    report.uploaded.push(upload.file_name.clone());
                    if let Err(e) = self.refresh().await {
                        warn!("Refresh after upload failed: {}", e);
                    }
                }
                Err(e) => {
                    warn!("Upload of {} failed: {}", upload.file_name, e);
                    report.failed.push((upload.file_name.clone(), e));
                }
            }
        }
        Ok(report)
    }

    /// Replace the content of an existing file, keeping the old one as a version
    pub async fn upload_new_version(
        &self,
        file_id: &str,
        upload: &FileUpload,
    ) -> Result<FetchOutcome, ClientError> {
        let token = self.require_token().await?;
        self.gateway.upload_new_version(&token, file_id, upload).await?;
        info!("Uploaded new version of {} ({} bytes)", file_id, upload.len());
        self.refresh().await
    }

    // ============ Folder context ============

    /// Current folder and its breadcrumb trail
    pub async fn location(&self) -> Result<FolderLocation, ClientError> {
        let folder_id = self.state.read().await.coords.folder_id.clone();
        let Some(folder_id) = folder_id else {
            return Ok(FolderLocation {
                current: None,
                trail: vec![Breadcrumb::root()],
            });
        };

        let token = self.require_token().await?;
        let (current, crumbs) = tokio::join!(
            self.gateway.folder(&token, &folder_id),
            self.gateway.breadcrumbs(&token, &folder_id)
        );
        let current = current?;

        let trail = match crumbs {
            Ok(crumbs) => std::iter::once(Breadcrumb::root())
                .chain(crumbs.into_iter().filter(|c| !c.is_root()))
                .collect(),
            Err(e) => {
                warn!("Breadcrumbs for {} unavailable: {}", folder_id, e);
                Vec::new()
            }
        };

        Ok(FolderLocation {
            current: Some(current),
            trail,
        })
    }

    /// Quota report, `None` when signed out or unavailable
    pub async fn storage_usage(&self) -> Option<StorageUsage> {
        let token = self.token().await?;
        match self.gateway.storage_usage(&token).await {
            Ok(usage) => Some(usage),
            Err(e) => {
                warn!("Storage usage unavailable: {}", e);
                None
            }
        }
    }

    // ============ Versions & sharing ============

    pub async fn versions(&self, file_id: &str) -> Result<Vec<FileVersion>, ClientError> {
        let token = self.require_token().await?;
        self.gateway.list_versions(&token, file_id).await
    }

    /// Stream a stored version to `dest`, returning the bytes written
    pub async fn download_version(
        &self,
        version_id: &str,
        dest: &Path,
        on_progress: Option<Box<dyn Fn(u64, u64) + Send>>,
    ) -> Result<u64, ClientError> {
        let token = self.require_token().await?;
        let written = self
            .gateway
            .download_version(&token, version_id, dest, on_progress)
            .await?;
        info!("Downloaded version {} to {:?} ({} bytes)", version_id, dest, written);
        Ok(written)
    }

    pub async fn create_share_link(
        &self,
        resource_id: &str,
        resource_type: ResourceKind,
        role: ShareRole,
    ) -> Result<String, ClientError> {
        let token = self.require_token().await?;
        let request = ShareRequest {
            resource_id: resource_id.to_string(),
            resource_type,
            role,
        };
        let link = self.gateway.create_share_link(&token, &request).await?;
        info!("Shared {} {} as {:?}", resource_type, resource_id, role);
        Ok(link)
    }

    /// Resolve a share link; works signed out for public shares
    pub async fn open_share(&self, share_id: &str) -> Result<SharedResource, ClientError> {
        let token = self.token().await;
        self.gateway.access_share(token.as_ref(), share_id).await
    }

    // ============ Session ============

    /// Follow session changes: sign-out empties the list, sign-in reloads it
    pub fn follow_session(self: &Arc<Self>) -> SessionFollower {
        let mut subscription = self.session.subscribe();
        let controller = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            while let Some(change) = subscription.changed().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                match change {
                    Some(_) => {
                        info!("Session started, reloading list");
                        if let Err(e) = controller.refresh().await {
                            warn!("Reload after sign-in failed: {}", e);
                        }
                    }
                    None => {
                        info!("Session ended, clearing list");
                        controller.invalidate().await;
                    }
                }
            }
            debug!("Session follower stopped");
        });

        SessionFollower { handle }
    }
}
