//! Media-type filtering
//!
//! Purely local classification of already-fetched files. Folders are never
//! touched and no gateway call is ever made from here, so a filtered page can
//! look empty while more unfiltered pages remain on the server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::gateway::{FileEntry, ResourceEntry};

/// Sidebar filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    All,
    Image,
    Document,
    Video,
    Other,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MediaType::All => "all",
            MediaType::Image => "image",
            MediaType::Document => "document",
            MediaType::Video => "video",
            MediaType::Other => "other",
        };
        f.write_str(label)
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(MediaType::All),
            "image" | "images" => Ok(MediaType::Image),
            "document" | "documents" | "doc" | "docs" => Ok(MediaType::Document),
            "video" | "videos" => Ok(MediaType::Video),
            "other" => Ok(MediaType::Other),
            other => Err(format!("unknown media type: {}", other)),
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "ico"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "txt"];

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
];

/// MIME types that say nothing about the content
const GENERIC_MIME_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream"];

/// Normalized MIME type, `None` when absent or generic
fn specific_mime(file: &FileEntry) -> Option<String> {
    let mime = file.mime_type.as_deref()?;
    // Drop parameters such as "; charset=utf-8"
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if essence.is_empty() || GENERIC_MIME_TYPES.contains(&essence.as_str()) {
        None
    } else {
        Some(essence)
    }
}

/// Classify a single file as Image, Video, Document or Other.
///
/// A specific MIME type decides first; the extension table is consulted only
/// when the MIME type is missing, generic, or not one of the known kinds.
pub fn classify(file: &FileEntry) -> MediaType {
    if let Some(mime) = specific_mime(file) {
        if mime.starts_with("image/") {
            return MediaType::Image;
        }
        if mime.starts_with("video/") {
            return MediaType::Video;
        }
        if DOCUMENT_MIME_TYPES.contains(&mime.as_str()) {
            return MediaType::Document;
        }
    }

    match file.extension() {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => MediaType::Image,
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => MediaType::Video,
        Some(ext) if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) => MediaType::Document,
        _ => MediaType::Other,
    }
}

/// Whether a file belongs under the given filter
pub fn matches_media_type(file: &FileEntry, media_type: MediaType) -> bool {
    match media_type {
        MediaType::All => true,
        wanted => classify(file) == wanted,
    }
}

/// Filter a list, keeping every folder and the files matching `media_type`
pub fn filter_by_media_type(entries: &[ResourceEntry], media_type: MediaType) -> Vec<ResourceEntry> {
    entries
        .iter()
        .filter(|entry| match entry {
            ResourceEntry::Folder(_) => true,
            ResourceEntry::File(file) => matches_media_type(file, media_type),
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FolderEntry;

    fn file(name: &str, mime: Option<&str>) -> FileEntry {
        FileEntry {
            id: name.to_string(),
            name: name.to_string(),
            folder_id: None,
            size: 1,
            mime_type: mime.map(str::to_string),
            public_url: None,
            created_at: None,
            trashed: false,
        }
    }

    fn folder(name: &str) -> ResourceEntry {
        ResourceEntry::Folder(FolderEntry {
            id: name.to_string(),
            name: name.to_string(),
            parent_folder_id: None,
            created_at: None,
            trashed: false,
        })
    }

    #[test]
    fn test_extension_fallback_is_case_insensitive() {
        assert_eq!(classify(&file("photo.JPG", None)), MediaType::Image);
        assert_eq!(classify(&file("clip.MkV", None)), MediaType::Video);
        assert_eq!(classify(&file("Budget.XLSX", None)), MediaType::Document);
    }

    #[test]
    fn test_mime_takes_precedence() {
        // MIME says video, name says image
        assert_eq!(classify(&file("thumb.png", Some("video/mp4"))), MediaType::Video);
        assert_eq!(classify(&file("scan", Some("application/pdf"))), MediaType::Document);
        assert_eq!(classify(&file("notes", Some("text/plain; charset=utf-8"))), MediaType::Document);
        assert_eq!(classify(&file("x", Some("IMAGE/PNG"))), MediaType::Image);
    }

    #[test]
    fn test_generic_mime_falls_back_to_extension() {
        assert_eq!(classify(&file("song.mp4", Some("application/octet-stream"))), MediaType::Video);
        assert_eq!(classify(&file("photo.jpeg", Some(""))), MediaType::Image);
    }

    #[test]
    fn test_other_is_complement() {
        assert_eq!(classify(&file("archive.zip", Some("application/zip"))), MediaType::Other);
        assert_eq!(classify(&file("Makefile", None)), MediaType::Other);
        assert_eq!(classify(&file("page.html", Some("text/html"))), MediaType::Other);

        let samples = [
            file("a.png", None),
            file("b.mov", None),
            file("c.pdf", None),
            file("d.zip", None),
            file("e", Some("audio/mpeg")),
        ];
        for f in &samples {
            let hits = [MediaType::Image, MediaType::Video, MediaType::Document, MediaType::Other]
                .iter()
                .filter(|m| matches_media_type(f, **m))
                .count();
            assert_eq!(hits, 1, "{} must land in exactly one bucket", f.name);
        }
    }

    #[test]
    fn test_filter_keeps_folders_and_is_idempotent() {
        let entries = vec![
            folder("Photos"),
            ResourceEntry::File(file("a.png", None)),
            ResourceEntry::File(file("b.pdf", None)),
            folder("Docs"),
            ResourceEntry::File(file("c.gif", Some("image/gif"))),
        ];

        let once = filter_by_media_type(&entries, MediaType::Image);
        let twice = filter_by_media_type(&once, MediaType::Image);
        assert_eq!(once, twice);

        let names: Vec<&str> = once.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Photos", "a.png", "Docs", "c.gif"]);

        assert_eq!(filter_by_media_type(&entries, MediaType::All), entries);
        assert_eq!(filter_by_media_type(&entries, MediaType::Video).len(), 2);
    }

    #[test]
    fn test_media_type_parsing() {
        assert_eq!("Images".parse::<MediaType>().unwrap(), MediaType::Image);
        assert_eq!("docs".parse::<MediaType>().unwrap(), MediaType::Document);
        assert!("audio".parse::<MediaType>().is_err());
        assert_eq!(MediaType::Other.to_string(), "other");
    }
}
