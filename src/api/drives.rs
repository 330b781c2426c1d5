//! Document libraries and the items inside them

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::encode_path;
use super::graph::GraphClient;
use crate::error::{Error, Result};
use crate::models::{Drive, DriveItem, Site};

/// Largest payload accepted by a single-request upload (4 MiB).
pub const SIMPLE_UPLOAD_LIMIT: u64 = 4 * 1024 * 1024;

pub struct DriveService<'a> {
    graph: &'a GraphClient,
}

impl<'a> DriveService<'a> {
    pub fn new(graph: &'a GraphClient) -> Self {
        Self { graph }
    }

    pub async fn list_drives(&self, site: &Site) -> Result<Vec<Drive>> {
        let path = format!("sites/{}/drives", site.id);
        let drives: Vec<Drive> = self.graph.get_paged(&path, &[]).await?;
        tracing::debug!("Site {} has {} libraries", site.label(), drives.len());
        Ok(drives)
    }

    /// Library whose name matches `name` ignoring case; the first match wins.
    pub async fn get_drive_by_name(&self, site: &Site, name: &str) -> Result<Drive> {
        let wanted = name.trim().to_lowercase();
        let drives = self.list_drives(site).await?;
        let available: Vec<String> = drives.iter().map(|d| d.name.clone()).collect();

        drives
            .into_iter()
            .find(|d| d.name.to_lowercase() == wanted)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "library '{}' in site {} (available: {})",
                    name.trim(),
                    site.label(),
                    if available.is_empty() {
                        "none".to_string()
                    } else {
                        available.join(", ")
                    }
                ))
            })
    }

    pub async fn list_root_items(&self, drive_id: &str) -> Result<Vec<DriveItem>> {
        let path = format!("drives/{}/root/children", encode_path(drive_id));
        self.graph.get_paged(&path, &[]).await
    }

    /// Children of the folder at `folder_path`; an empty path lists the root.
    pub async fn list_folder_items(&self, drive_id: &str, folder_path: &str) -> Result<Vec<DriveItem>> {
        let encoded = encode_path(folder_path);
        if encoded.is_empty() {
            return self.list_root_items(drive_id).await;
        }
        let path = format!("drives/{}/root:/{}:/children", encode_path(drive_id), encoded);
        self.graph
            .get_paged(&path, &[])
            .await
            .map_err(|e| e.not_found_as(format!("folder '{}' in drive {}", folder_path, drive_id)))
    }

    pub async fn list_items_by_id(&self, drive_id: &str, item_id: &str) -> Result<Vec<DriveItem>> {
        let path = format!(
            "drives/{}/items/{}/children",
            encode_path(drive_id),
            encode_path(item_id)
        );
        self.graph
            .get_paged(&path, &[])
            .await
            .map_err(|e| e.not_found_as(format!("item {} in drive {}", item_id, drive_id)))
    }

    pub async fn get_item_by_id(&self, drive_id: &str, item_id: &str) -> Result<DriveItem> {
        let path = format!("drives/{}/items/{}", encode_path(drive_id), encode_path(item_id));
        self.graph
            .get(&path, &[])
            .await
            .map_err(|e| e.not_found_as(format!("item {} in drive {}", item_id, drive_id)))
    }

    /// Item at `item_path` relative to the drive root; an empty path is the root.
    pub async fn get_item_by_path(&self, drive_id: &str, item_path: &str) -> Result<DriveItem> {
        let encoded = encode_path(item_path);
        let path = if encoded.is_empty() {
            format!("drives/{}/root", encode_path(drive_id))
        } else {
            format!("drives/{}/root:/{}", encode_path(drive_id), encoded)
        };
        self.graph
            .get(&path, &[])
            .await
            .map_err(|e| e.not_found_as(format!("'{}' in drive {}", item_path, drive_id)))
    }

    /// Upload `local_file` into `folder_path` with one PUT. Files above
    /// [`SIMPLE_UPLOAD_LIMIT`] are rejected before anything is sent.
    pub async fn upload_file(
        &self,
        drive_id: &str,
        folder_path: &str,
        local_file: &Path,
    ) -> Result<DriveItem> {
        let metadata = tokio::fs::metadata(local_file)
            .await
            .map_err(|e| Error::io(local_file, e))?;
        if !metadata.is_file() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a regular file",
                local_file.display()
            )));
        }
        check_upload_size(local_file, metadata.len())?;

        let file_name = local_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("{} has no file name", local_file.display()))
            })?;

        let data = tokio::fs::read(local_file)
            .await
            .map_err(|e| Error::io(local_file, e))?;
        // The file may have grown between stat and read.
        check_upload_size(local_file, data.len() as u64)?;

        let target = upload_target(folder_path, &file_name);
        let path = format!("drives/{}/root:/{}:/content", encode_path(drive_id), target);
        let size = data.len();
        let item: DriveItem = self
            .graph
            .put_bytes(&path, data, "application/octet-stream")
            .await?;
        tracing::info!("Uploaded {} ({} bytes) to {}", local_file.display(), size, item.path);
        Ok(item)
    }

    /// Download an item to `destination`. The body is written to a hidden
    /// sibling first and renamed into place once complete; on failure the
    /// partial file is removed and `destination` is left untouched.
    pub async fn download_file(
        &self,
        drive_id: &str,
        item_id: &str,
        destination: &Path,
    ) -> Result<PathBuf> {
        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("{} has no file name", destination.display()))
            })?;
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| Error::io(&parent, e))?;

        let partial = parent.join(format!(".{}.{}.part", file_name, Uuid::new_v4().simple()));
        let result = match self.stream_to(drive_id, item_id, &partial).await {
            Ok(bytes) => tokio::fs::rename(&partial, destination)
                .await
                .map(|_| bytes)
                .map_err(|e| Error::io(destination, e)),
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                tracing::info!("Downloaded {} ({} bytes) to {}", item_id, bytes, destination.display());
                Ok(destination.to_path_buf())
            }
            Err(e) => {
                remove_partial(&partial).await;
                Err(e)
            }
        }
    }

    async fn stream_to(&self, drive_id: &str, item_id: &str, partial: &Path) -> Result<u64> {
        let path = format!(
            "drives/{}/items/{}/content",
            encode_path(drive_id),
            encode_path(item_id)
        );
        let mut resp = self
            .graph
            .get_stream(&path)
            .await
            .map_err(|e| e.not_found_as(format!("item {} in drive {}", item_id, drive_id)))?;

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| Error::io(partial, e))?;
        let mut written = 0u64;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| Error::from_reqwest(e, format!("download of item {} interrupted", item_id)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io(partial, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| Error::io(partial, e))?;
        file.sync_all().await.map_err(|e| Error::io(partial, e))?;
        Ok(written)
    }
}

fn check_upload_size(path: &Path, size: u64) -> Result<()> {
    if size > SIMPLE_UPLOAD_LIMIT {
        return Err(Error::SizeLimit {
            path: path.to_path_buf(),
            size,
            limit: SIMPLE_UPLOAD_LIMIT,
        });
    }
    Ok(())
}

/// `"/Reports/2024/"`, `"q1.xlsx"` → `Reports/2024/q1.xlsx` (encoded)
fn upload_target(folder_path: &str, file_name: &str) -> String {
    let folder = encode_path(folder_path);
    let name = encode_path(file_name);
    if folder.is_empty() {
        name
    } else {
        format!("{}/{}", folder, name)
    }
}

async fn remove_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => tracing::debug!("Removed partial download {}", partial.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial download {}: {}", partial.display(), e),
    }
}
