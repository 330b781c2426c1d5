//! Document library and item models

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

/// Document library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub drive_type: Option<String>,
    pub web_url: Option<String>,
}

/// Folder or file. Folder items never carry file metadata and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Folder { child_count: Option<u64> },
    File { mime_type: Option<String> },
}

/// File or folder inside a drive
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawDriveItem")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    /// Path from the drive root, e.g. `/Reports/2024/q1.xlsx`; `/` for the root.
    pub path: String,
    pub size: u64,
    pub web_url: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub kind: ItemKind,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, ItemKind::File { .. })
    }
}

// -- Graph wire shape --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDriveItem {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    web_url: Option<String>,
    last_modified_date_time: Option<DateTime<Utc>>,
    parent_reference: Option<ParentReference>,
    folder: Option<FolderFacet>,
    file: Option<FileFacet>,
    root: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ParentReference {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderFacet {
    child_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileFacet {
    mime_type: Option<String>,
}

impl From<RawDriveItem> for DriveItem {
    fn from(raw: RawDriveItem) -> Self {
        let kind = match (raw.folder, raw.file) {
            (Some(folder), _) => ItemKind::Folder {
                child_count: folder.child_count,
            },
            (None, Some(file)) => ItemKind::File {
                mime_type: file.mime_type,
            },
            (None, None) if raw.root.is_some() => ItemKind::Folder { child_count: None },
            (None, None) => ItemKind::File { mime_type: None },
        };

        let path = if raw.root.is_some() {
            "/".to_string()
        } else {
            let parent = raw
                .parent_reference
                .and_then(|p| p.path)
                .map(|p| drive_relative(&p))
                .unwrap_or_default();
            format!("{}/{}", parent, raw.name)
        };

        DriveItem {
            id: raw.id,
            name: raw.name,
            path,
            size: raw.size,
            web_url: raw.web_url,
            last_modified: raw.last_modified_date_time,
            kind,
        }
    }
}

/// `/drives/{id}/root:/Reports%202024` → `/Reports 2024`; the root itself → ``.
fn drive_relative(parent_path: &str) -> String {
    let relative = match parent_path.find("root:") {
        Some(idx) => &parent_path[idx + "root:".len()..],
        None => parent_path,
    };
    percent_decode_str(relative.trim_end_matches('/'))
        .decode_utf8_lossy()
        .into_owned()
}
