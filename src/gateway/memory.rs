//! In-memory gateway used by the controller tests
//!
//! Behaves like a small file-manager backend: paginated listings, trash,
//! search, versions and shares, with per-operation failure injection and a
//! gate that can hold the next listing open mid-flight.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};

use super::*;
use crate::error::ClientError;

#[derive(Default)]
struct Store {
    folders: Vec<FolderEntry>,
    files: Vec<FileEntry>,
    versions: HashMap<String, Vec<(FileVersion, Vec<u8>)>>,
    shares: HashMap<String, SharedResource>,
    usage: Option<StorageUsage>,
    failures: HashMap<&'static str, u16>,
    calls: Vec<&'static str>,
    tokens: Vec<String>,
    listing_queries: Vec<(&'static str, ListingQuery)>,
    search_queries: Vec<SearchQuery>,
    uploads: Vec<(String, Option<String>)>,
    mutations: Vec<(MutationKind, String)>,
}

#[derive(Default)]
pub(crate) struct MemoryGateway {
    store: Mutex<Store>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    held: Notify,
}

pub(crate) fn folder(id: &str, name: &str, parent: Option<&str>) -> FolderEntry {
    FolderEntry {
        id: id.to_string(),
        name: name.to_string(),
        parent_folder_id: parent.map(str::to_string),
        created_at: None,
        trashed: false,
    }
}

pub(crate) fn file(id: &str, name: &str, folder_id: Option<&str>, size: u64) -> FileEntry {
    FileEntry {
        id: id.to_string(),
        name: name.to_string(),
        folder_id: folder_id.map(str::to_string),
        size,
        mime_type: None,
        public_url: None,
        created_at: None,
        trashed: false,
    }
}

/// (name, size, created_at) of an entry, for sorting
type SortKey<'a> = (&'a str, u64, &'a Option<String>);

fn compare(sort: SortField, a: SortKey<'_>, b: SortKey<'_>) -> Ordering {
    match sort {
        SortField::Name => a.0.to_lowercase().cmp(&b.0.to_lowercase()),
        SortField::Size => a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)),
        SortField::Date => a.2.cmp(b.2).then_with(|| a.0.cmp(b.0)),
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn page<T>(items: Vec<T>, offset: u32, limit: u32) -> Vec<T> {
    items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

fn not_found(what: &str, id: &str) -> ClientError {
    ClientError::Gateway {
        status: 404,
        message: format!("{} {} not found", what, id),
    }
}

impl MemoryGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_folders(self, folders: Vec<FolderEntry>) -> Self {
        self.lock().folders.extend(folders);
        self
    }

    pub(crate) fn with_files(self, files: Vec<FileEntry>) -> Self {
        self.lock().files.extend(files);
        self
    }

    pub(crate) fn with_usage(self, usage: StorageUsage) -> Self {
        self.lock().usage = Some(usage);
        self
    }

    pub(crate) fn with_version(self, file_id: &str, version: FileVersion, bytes: &[u8]) -> Self {
        self.lock()
            .versions
            .entry(file_id.to_string())
            .or_default()
            .push((version, bytes.to_vec()));
        self
    }

    pub(crate) fn with_share(self, share_id: &str, shared: SharedResource) -> Self {
        self.lock().shares.insert(share_id.to_string(), shared);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    /// Make every call of `op` fail with `status` until cleared
    pub(crate) fn fail(&self, op: &'static str, status: u16) {
        self.lock().failures.insert(op, status);
    }

    pub(crate) fn clear_failure(&self, op: &'static str) {
        self.lock().failures.remove(op);
    }

    /// Hold the next folder listing (or search) until the sender fires
    pub(crate) fn hold_next_listing(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Resolves once a held listing has reached the gate
    pub(crate) async fn wait_until_held(&self) {
        self.held.notified().await;
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub(crate) fn call_count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub(crate) fn tokens(&self) -> Vec<String> {
        self.lock().tokens.clone()
    }

    pub(crate) fn listing_queries(&self) -> Vec<(&'static str, ListingQuery)> {
        self.lock().listing_queries.clone()
    }

    pub(crate) fn search_queries(&self) -> Vec<SearchQuery> {
        self.lock().search_queries.clone()
    }

    pub(crate) fn uploads(&self) -> Vec<(String, Option<String>)> {
        self.lock().uploads.clone()
    }

    pub(crate) fn mutations(&self) -> Vec<(MutationKind, String)> {
        self.lock().mutations.clone()
    }

    pub(crate) fn stored_file(&self, id: &str) -> Option<FileEntry> {
        self.lock().files.iter().find(|f| f.id == id).cloned()
    }

    pub(crate) fn stored_folder(&self, id: &str) -> Option<FolderEntry> {
        self.lock().folders.iter().find(|f| f.id == id).cloned()
    }

    fn record(&self, op: &'static str, token: Option<&SecretString>) -> Result<(), ClientError> {
        let mut store = self.lock();
        store.calls.push(op);
        if let Some(token) = token {
            store.tokens.push(token.expose_secret().to_string());
        }
        match store.failures.get(op) {
            Some(status) => Err(ClientError::Gateway {
                status: *status,
                message: format!("{} failed: injected", op),
            }),
            None => Ok(()),
        }
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            self.held.notify_one();
            let _ = rx.await;
        }
    }

    fn folders_where(&self, query: &ListingQuery, trashed: bool) -> Vec<FolderEntry> {
        let store = self.lock();
        let mut folders: Vec<FolderEntry> = store
            .folders
            .iter()
            .filter(|f| f.trashed == trashed)
            .filter(|f| trashed || f.parent_folder_id == query.folder_id)
            .cloned()
            .collect();
        folders.sort_by(|a, b| {
            directed(
                compare(query.sort, (&a.name, 0, &a.created_at), (&b.name, 0, &b.created_at)),
                query.order,
            )
        });
        page(folders, query.offset, query.limit)
    }

    fn files_where(&self, query: &ListingQuery, trashed: bool) -> Vec<FileEntry> {
        let store = self.lock();
        let mut files: Vec<FileEntry> = store
            .files
            .iter()
            .filter(|f| f.trashed == trashed)
            .filter(|f| trashed || f.folder_id == query.folder_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| {
            directed(
                compare(query.sort, (&a.name, a.size, &a.created_at), (&b.name, b.size, &b.created_at)),
                query.order,
            )
        });
        page(files, query.offset, query.limit)
    }
}

#[async_trait]
impl ResourceGateway for MemoryGateway {
    fn display_name(&self) -> String {
        "memory".to_string()
    }

    async fn list_folders(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FolderEntry>, ClientError> {
        self.record("list_folders", Some(token))?;
        self.lock().listing_queries.push(("folders", query.clone()));
        self.pass_gate().await;
        Ok(self.folders_where(query, false))
    }

    async fn list_files(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FileEntry>, ClientError> {
        self.record("list_files", Some(token))?;
        self.lock().listing_queries.push(("files", query.clone()));
        Ok(self.files_where(query, false))
    }

    async fn list_trashed_folders(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FolderEntry>, ClientError> {
        self.record("list_trashed_folders", Some(token))?;
        self.lock().listing_queries.push(("folders/trash", query.clone()));
        self.pass_gate().await;
        // the real endpoint does not flag its own entries
        Ok(self
            .folders_where(query, true)
            .into_iter()
            .map(|f| FolderEntry { trashed: false, ..f })
            .collect())
    }

    async fn list_trashed_files(
        &self,
        token: &SecretString,
        query: &ListingQuery,
    ) -> Result<Vec<FileEntry>, ClientError> {
        self.record("list_trashed_files", Some(token))?;
        self.lock().listing_queries.push(("files/trash", query.clone()));
        Ok(self
            .files_where(query, true)
            .into_iter()
            .map(|f| FileEntry { trashed: false, ..f })
            .collect())
    }

    async fn search(
        &self,
        token: &SecretString,
        query: &SearchQuery,
    ) -> Result<SearchResults, ClientError> {
        self.record("search", Some(token))?;
        self.lock().search_queries.push(query.clone());
        self.pass_gate().await;

        let needle = query.q.to_lowercase();
        let hit = |name: &str| name.to_lowercase().contains(&needle);
        let store = self.lock();
        let folders: Vec<FolderEntry> = store
            .folders
            .iter()
            .filter(|f| !f.trashed && hit(&f.name))
            .cloned()
            .collect();
        let files: Vec<FileEntry> = store
            .files
            .iter()
            .filter(|f| !f.trashed && hit(&f.name))
            .cloned()
            .collect();

        Ok(SearchResults {
            folders: page(folders, query.offset, query.limit),
            files: page(files, query.offset, query.limit),
        })
    }

    async fn folder(&self, token: &SecretString, folder_id: &str) -> Result<FolderEntry, ClientError> {
        self.record("folder", Some(token))?;
        self.stored_folder(folder_id)
            .ok_or_else(|| not_found("Folder", folder_id))
    }

    async fn breadcrumbs(
        &self,
        token: &SecretString,
        folder_id: &str,
    ) -> Result<Vec<Breadcrumb>, ClientError> {
        self.record("breadcrumbs", Some(token))?;
        let mut trail = Vec::new();
        let mut next = Some(folder_id.to_string());
        while let Some(id) = next {
            let current = self.stored_folder(&id).ok_or_else(|| not_found("Folder", &id))?;
            trail.push(Breadcrumb {
                id: current.id.clone(),
                name: current.name.clone(),
            });
            next = current.parent_folder_id;
        }
        trail.reverse();
        Ok(trail)
    }

    async fn create_folder(
        &self,
        token: &SecretString,
        name: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<FolderEntry, ClientError> {
        self.record("create_folder", Some(token))?;
        let created = folder(&uuid::Uuid::new_v4().to_string(), name, parent_folder_id);
        self.lock().folders.push(created.clone());
        Ok(created)
    }

    async fn mutate(
        &self,
        token: &SecretString,
        kind: MutationKind,
        entry_id: &str,
    ) -> Result<(), ClientError> {
        self.record("mutate", Some(token))?;
        let mut store = self.lock();
        store.mutations.push((kind, entry_id.to_string()));

        match kind.resource_kind() {
            ResourceKind::File => {
                let index = store
                    .files
                    .iter()
                    .position(|f| f.id == entry_id)
                    .ok_or_else(|| not_found("File", entry_id))?;
                match kind {
                    MutationKind::DeleteFile => {
                        store.files.remove(index);
                    }
                    _ => store.files[index].trashed = kind == MutationKind::TrashFile,
                }
            }
            ResourceKind::Folder => {
                let index = store
                    .folders
                    .iter()
                    .position(|f| f.id == entry_id)
                    .ok_or_else(|| not_found("Folder", entry_id))?;
                match kind {
                    MutationKind::DeleteFolder => {
                        store.folders.remove(index);
                    }
                    _ => store.folders[index].trashed = kind == MutationKind::TrashFolder,
                }
            }
        }
        Ok(())
    }

    async fn upload_file(
        &self,
        token: &SecretString,
        upload: &FileUpload,
        folder_id: Option<&str>,
    ) -> Result<(), ClientError> {
        self.record("upload_file", Some(token))?;
        let mut stored = file(
            &uuid::Uuid::new_v4().to_string(),
            &upload.file_name,
            folder_id,
            upload.len(),
        );
        stored.mime_type = Some(upload.mime_type.clone());

        let mut store = self.lock();
        store
            .uploads
            .push((upload.file_name.clone(), folder_id.map(str::to_string)));
        store.files.push(stored);
        Ok(())
    }

    async fn upload_new_version(
        &self,
        token: &SecretString,
        file_id: &str,
        upload: &FileUpload,
    ) -> Result<(), ClientError> {
        self.record("upload_new_version", Some(token))?;
        let mut store = self.lock();
        let current = store
            .files
            .iter_mut()
            .find(|f| f.id == file_id)
            .ok_or_else(|| not_found("File", file_id))?;
        current.size = upload.len();

        let version = FileVersion {
            id: uuid::Uuid::new_v4().to_string(),
            name: Some(upload.file_name.clone()),
            size: upload.len(),
            created_at: None,
        };
        store
            .versions
            .entry(file_id.to_string())
            .or_default()
            .push((version, upload.bytes.clone()));
        Ok(())
    }

    async fn list_versions(
        &self,
        token: &SecretString,
        file_id: &str,
    ) -> Result<Vec<FileVersion>, ClientError> {
        self.record("list_versions", Some(token))?;
        Ok(self
            .lock()
            .versions
            .get(file_id)
            .map(|versions| versions.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default())
    }

    async fn download_version(
        &self,
        token: &SecretString,
        version_id: &str,
        local_path: &Path,
        on_progress: Option<Box<dyn Fn(u64, u64) + Send>>,
    ) -> Result<u64, ClientError> {
        self.record("download_version", Some(token))?;
        let bytes = self
            .lock()
            .versions
            .values()
            .flatten()
            .find(|(v, _)| v.id == version_id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| not_found("Version", version_id))?;

        tokio::fs::write(local_path, &bytes).await?;
        let total = bytes.len() as u64;
        if let Some(progress) = on_progress {
            progress(total, total);
        }
        Ok(total)
    }

    async fn storage_usage(&self, token: &SecretString) -> Result<StorageUsage, ClientError> {
        self.record("storage_usage", Some(token))?;
        self.lock()
            .usage
            .clone()
            .ok_or_else(|| not_found("Usage", "report"))
    }

    async fn create_share_link(
        &self,
        token: &SecretString,
        request: &ShareRequest,
    ) -> Result<String, ClientError> {
        self.record("create_share_link", Some(token))?;
        let share_id = uuid::Uuid::new_v4().to_string();
        let shared = SharedResource {
            resource: SharedResourceBody {
                id: Some(request.resource_id.clone()),
                name: None,
                url: None,
            },
            role: request.role,
            resource_type: request.resource_type,
        };
        self.lock().shares.insert(share_id.clone(), shared);
        Ok(format!("https://files.test/share/{}", share_id))
    }

    async fn access_share(
        &self,
        token: Option<&SecretString>,
        share_id: &str,
    ) -> Result<SharedResource, ClientError> {
        self.record("access_share", token)?;
        self.lock()
            .shares
            .get(share_id)
            .cloned()
            .ok_or_else(|| not_found("Share", share_id))
    }
}
