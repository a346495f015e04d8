//! List state machine
//!
//! Everything the list controller knows lives in one `ListState` value. The
//! transitions here are synchronous and pure so they can be tested without a
//! runtime; `ListController` wraps them with the gateway round-trips.
//!
//! Epochs: every invalidation bumps `epoch`. A `PageRequest` remembers the
//! epoch it was issued in and its result is only merged while that epoch is
//! still current.

use serde::Serialize;

use crate::gateway::{
    FileEntry, FolderEntry, ListingQuery, ResourceEntry, SearchQuery, SortField, SortOrder,
};
use crate::media::{filter_by_media_type, MediaType};

/// Everything that decides which resources are listed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewCoordinates {
    /// `None` is the root folder
    pub folder_id: Option<String>,
    pub search_term: String,
    pub sort: SortField,
    pub order: SortOrder,
    pub viewing_trash: bool,
    /// Local filter only, never part of a query
    pub media_type: MediaType,
}

impl ViewCoordinates {
    /// Map the placeholder ids routers hand out for "no folder" to `None`
    pub fn normalize_folder_id(folder_id: Option<&str>) -> Option<String> {
        match folder_id.map(str::trim) {
            None | Some("") | Some("null") | Some("undefined") => None,
            Some(id) => Some(id.to_string()),
        }
    }

    /// Trimmed search term, `None` when there is nothing to search for
    pub fn active_search(&self) -> Option<&str> {
        let term = self.search_term.trim();
        (!term.is_empty()).then_some(term)
    }

    /// Whether switching from `self` to `other` changes what the server returns
    pub fn listing_differs(&self, other: &ViewCoordinates) -> bool {
        self.folder_id != other.folder_id
            || self.search_term != other.search_term
            || self.sort != other.sort
            || self.order != other.order
            || self.viewing_trash != other.viewing_trash
    }
}

/// Pagination bookkeeping for the current epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageCursor {
    /// 1-based
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl PageCursor {
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit: limit.max(1),
            has_more: true,
        }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.limit)
    }

    fn reset(&mut self) {
        self.page = 1;
        self.has_more = true;
    }
}

/// Load phase of the list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoadPhase {
    Idle,
    Loading,
    Loaded,
    Errored(String),
}

impl LoadPhase {
    pub fn is_errored(&self) -> bool {
        matches!(self, LoadPhase::Errored(_))
    }
}

/// A page query frozen at the moment it was issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub epoch: u64,
    pub coords: ViewCoordinates,
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Search query, when the coordinates carry a search term
    pub fn search_query(&self) -> Option<SearchQuery> {
        self.coords.active_search().map(|q| SearchQuery {
            q: q.to_string(),
            folder_id: self.coords.folder_id.clone(),
            sort: self.coords.sort,
            order: self.coords.order,
            limit: self.limit,
            offset: self.offset(),
        })
    }

    /// Listing query for the folder/file (or trash) endpoints
    pub fn listing_query(&self) -> ListingQuery {
        ListingQuery {
            folder_id: self.coords.folder_id.clone(),
            sort: self.coords.sort,
            order: self.coords.order,
            limit: self.limit,
            offset: self.offset(),
        }
    }
}

/// What came back for one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPage {
    pub folders: Vec<FolderEntry>,
    pub files: Vec<FileEntry>,
    /// Trash listings do not flag their entries themselves
    pub from_trash: bool,
}

impl FetchedPage {
    pub fn len(&self) -> usize {
        self.folders.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Folders first, then files, trash-stamped when needed
    pub fn into_entries(self) -> Vec<ResourceEntry> {
        let from_trash = self.from_trash;
        self.folders
            .into_iter()
            .map(ResourceEntry::Folder)
            .chain(self.files.into_iter().map(ResourceEntry::File))
            .map(|mut entry| {
                if from_trash {
                    entry.mark_trashed();
                }
                entry
            })
            .collect()
    }
}

/// Result of merging a page into the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageApply {
    Applied { received: usize, has_more: bool },
    /// Issued for an older epoch or out of sequence; dropped
    Stale,
}

/// Scroll position reported by the front end
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Distance scrolled from the top
    pub offset: f64,
    /// Height of the visible window
    pub viewport: f64,
    /// Total height of the rendered list
    pub content: f64,
}

impl ScrollMetrics {
    pub fn is_near_end(&self, threshold: f64) -> bool {
        self.offset + self.viewport >= self.content - threshold
    }
}

/// The whole list state
#[derive(Debug, Clone, Serialize)]
pub struct ListState {
    pub coords: ViewCoordinates,
    pub cursor: PageCursor,
    pub entries: Vec<ResourceEntry>,
    pub phase: LoadPhase,
    pub epoch: u64,
    /// Pages of the current epoch already merged, in order
    pub loaded_pages: u32,
}

impl ListState {
    pub fn new(limit: u32) -> Self {
        Self {
            coords: ViewCoordinates::default(),
            cursor: PageCursor::new(limit),
            entries: Vec::new(),
            phase: LoadPhase::Idle,
            epoch: 0,
            loaded_pages: 0,
        }
    }

    /// Drop everything fetched so far and start a new epoch
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.cursor.reset();
        self.phase = LoadPhase::Idle;
        self.loaded_pages = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Change coordinates; invalidates when the listing is affected.
    /// Returns whether an invalidation happened.
    pub fn update_coords(&mut self, update: impl FnOnce(&mut ViewCoordinates)) -> bool {
        let mut next = self.coords.clone();
        update(&mut next);
        let changed = self.coords.listing_differs(&next);
        self.coords = next;
        if changed {
            self.invalidate();
        }
        changed
    }

    /// Freeze the query for the current page and mark the list as loading
    pub fn begin_fetch(&mut self) -> PageRequest {
        self.phase = LoadPhase::Loading;
        PageRequest {
            epoch: self.epoch,
            coords: self.coords.clone(),
            page: self.cursor.page,
            limit: self.cursor.limit,
        }
    }

    fn accepts(&self, request: &PageRequest) -> bool {
        request.epoch == self.epoch
            && request.page == self.cursor.page
            && (request.page == 1 || request.page == self.loaded_pages + 1)
    }

    /// Merge a page: page 1 replaces the list, later pages append
    pub fn apply_page(&mut self, request: &PageRequest, page: FetchedPage) -> PageApply {
        if !self.accepts(request) {
            return PageApply::Stale;
        }

        let received = page.len();
        let has_more = received >= request.limit as usize;
        let entries = page.into_entries();

        if request.page == 1 {
            self.entries = entries;
        } else {
            self.entries.extend(entries);
        }
        self.cursor.has_more = has_more;
        self.loaded_pages = request.page;
        self.phase = LoadPhase::Loaded;

        PageApply::Applied { received, has_more }
    }

    /// Record a failed fetch. Returns false when the request was stale or its
    /// page already landed through another request.
    pub fn fail_fetch(&mut self, request: &PageRequest, message: String) -> bool {
        if request.epoch != self.epoch {
            return false;
        }
        if !self.accepts(request) || self.loaded_pages >= request.page {
            if self.phase == LoadPhase::Loading && self.loaded_pages == self.cursor.page {
                self.phase = LoadPhase::Loaded;
            }
            return false;
        }
        self.phase = LoadPhase::Errored(message);
        true
    }

    /// Move to the next page if the current one is in and more exist.
    ///
    /// Until the requested page has been merged, further calls are no-ops, so
    /// a burst of near-end signals advances exactly once.
    pub fn advance_page(&mut self) -> bool {
        if !self.cursor.has_more || self.loaded_pages != self.cursor.page {
            return false;
        }
        self.cursor.page += 1;
        true
    }

    /// Page requested but not merged yet
    pub fn pending_page(&self) -> Option<u32> {
        (self.loaded_pages != self.cursor.page).then_some(self.cursor.page)
    }

    /// Entries after the local media-type filter
    pub fn visible_entries(&self) -> Vec<ResourceEntry> {
        filter_by_media_type(&self.entries, self.coords.media_type)
    }
}
