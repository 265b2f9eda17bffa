//! Folder conventions
//!
//! The backend has no directory objects. A folder exists when some object
//! lives under its prefix; an otherwise empty folder is kept alive by a
//! zero-byte marker object named [`FOLDER_MARKER`] inside it.

use serde::{Deserialize, Serialize};

use crate::storage::ObjectEntry;

/// Name of the zero-byte object that materializes an empty folder
pub const FOLDER_MARKER: &str = ".keep";

/// Kind of a listed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

/// One item of a folder listing as returned to API callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Join an optional folder and a file name into an object path
pub fn object_path(folder: &str, name: &str) -> String {
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Path of a new folder (with trailing slash) below an optional parent
pub fn folder_path(parent: &str, name: &str) -> String {
    format!("{}/", object_path(parent, name))
}

/// Path of the marker object for a folder
pub fn marker_path(folder: &str) -> String {
    object_path(folder, FOLDER_MARKER)
}

/// Classify raw listing entries into files and folders.
///
/// Entries without metadata are folders. Entries with an empty name, or
/// whose name equals the listed folder itself, are dropped.
pub fn classify(entries: Vec<ObjectEntry>, folder: &str) -> Vec<StorageItem> {
    entries
        .into_iter()
        .filter(|entry| !entry.name.is_empty() && entry.name != folder)
        .map(|entry| {
            let size = entry.metadata.as_ref().map(|_| entry.size());
            let kind = if size.is_some() { ItemKind::File } else { ItemKind::Folder };
            StorageItem {
                path: entry.name.clone(),
                name: entry.name,
                kind,
                size,
            }
        })
        .collect()
}

/// Objects removed by a folder delete: every listed child plus the marker
pub fn removal_set(folder: &str, entries: &[ObjectEntry]) -> Vec<String> {
    let mut paths: Vec<String> = entries
        .iter()
        .filter(|entry| !entry.name.is_empty())
        .map(|entry| object_path(folder, &entry.name))
        .collect();

    let marker = marker_path(folder);
    if !paths.contains(&marker) {
        paths.push(marker);
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path() {
        assert_eq!(object_path("docs", "a.txt"), "docs/a.txt");
        assert_eq!(object_path("docs/", "a.txt"), "docs/a.txt");
        assert_eq!(object_path("docs//", "a.txt"), "docs/a.txt");
        assert_eq!(object_path("", "a.txt"), "a.txt");
    }

    #[test]
    fn test_folder_and_marker_paths() {
        assert_eq!(folder_path("", "photos"), "photos/");
        assert_eq!(folder_path("media/", "photos"), "media/photos/");
        assert_eq!(marker_path("media/photos/"), "media/photos/.keep");
        assert_eq!(marker_path("media/photos"), "media/photos/.keep");
    }

    #[test]
    fn test_classify_skips_self_reference() {
        let entries = vec![
            ObjectEntry::folder("docs"),
            ObjectEntry::folder("drafts"),
            ObjectEntry::file("a.txt", 12),
            ObjectEntry::folder(""),
        ];
        let items = classify(entries, "docs");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, ItemKind::Folder);
        assert_eq!(items[0].size, None);
        assert_eq!(items[1].kind, ItemKind::File);
        assert_eq!(items[1].size, Some(12));
        assert_eq!(items[1].path, "a.txt");
    }

    #[test]
    fn test_classify_metadata_without_size() {
        let entries = vec![ObjectEntry {
            name: "blob".into(),
            metadata: Some(serde_json::json!({})),
        }];
        let items = classify(entries, "");
        assert_eq!(items[0].kind, ItemKind::File);
        assert_eq!(items[0].size, Some(0));
    }

    #[test]
    fn test_item_serialization() {
        let folder = StorageItem {
            name: "docs".into(),
            kind: ItemKind::Folder,
            path: "docs".into(),
            size: None,
        };
        assert_eq!(
            serde_json::to_value(&folder).unwrap(),
            serde_json::json!({ "name": "docs", "type": "folder", "path": "docs" })
        );
    }

    #[test]
    fn test_removal_set_includes_marker_once() {
        let entries = vec![ObjectEntry::file("a.txt", 1), ObjectEntry::file(".keep", 0)];
        assert_eq!(removal_set("docs", &entries), vec!["docs/a.txt", "docs/.keep"]);

        let entries = vec![ObjectEntry::file("a.txt", 1)];
        assert_eq!(removal_set("docs/", &entries), vec!["docs/a.txt", "docs/.keep"]);
    }
}
