use disksync_core::{DiskError, Drive, MediaUpload, ResourceProperties};
use log::{debug, info};
use thiserror::Error;

use crate::file_info::{StatUpdate, SyncFileInfo};
use crate::options::SyncOptions;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("backend error: {0}")]
    Backend(#[from] DiskError),
    #[error("could not obtain file information: {0}")]
    InfoUnavailable(String),
    #[error("open failed: {0}")]
    OpenFailed(String),
    #[error("time parse error: {0}")]
    Time(#[from] time::error::Parse),
    #[error("failed to encode stat description: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Remote side of a sync pair. Every path argument is relative to the root
/// the adapter was created with; an empty path means the root itself.
pub struct RemoteFile<D> {
    drive: D,
    options: SyncOptions,
    path: String,
    bytes_written: u64,
}

impl<D: Drive> RemoteFile<D> {
    pub fn new(drive: D, options: SyncOptions, root: &str) -> Self {
        let path = drive.normalize_path(root);
        Self {
            drive,
            options,
            path,
            bytes_written: 0,
        }
    }

    pub fn drive(&self) -> &D {
        &self.drive
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Bytes reported by the backend for the last `update_file`.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_path(&self, path: &str) -> String {
        if path.is_empty() {
            return self.path.clone();
        }

        let base = self.drive.strip_path(&self.path);
        let relative = self.drive.strip_path(path);
        debug!("joining '{base}' with '{relative}'");
        let joined = self.drive.normalize_path(&format!("{base}/{relative}"));
        debug!(" * got: '{joined}'");
        joined
    }

    pub async fn get_info(&self, path: &str) -> Result<Option<SyncFileInfo>, RemoteError> {
        let path = self.get_path(path);
        self.fetch_info(&path).await
    }

    pub async fn get_uploader(&self, path: &str) -> Result<MediaUpload, RemoteError> {
        let path = self.get_path(path);
        let Some(info) = self.fetch_info(&path).await? else {
            return Err(RemoteError::InfoUnavailable(path));
        };

        debug!("opening remote file for reading: {path}");
        let Some(reader) = self.drive.open(&path).await? else {
            return Err(RemoteError::OpenFailed(path));
        };

        Ok(MediaUpload::new(reader, info.mime_type).resumable(true))
    }

    pub async fn create_dir(&self, path: &str) -> Result<(), RemoteError> {
        let path = self.get_path(path);
        info!("creating remote directory: {path}");

        if self.options.dry_run {
            return Ok(());
        }

        self.drive.mkdir(&path).await?;
        Ok(())
    }

    /// Creates every missing directory between the root and `path`, outermost
    /// first. `path` itself is left alone.
    pub async fn create_parent_dirs(&self, path: &str) -> Result<(), RemoteError> {
        let relative = self.drive.strip_path(&self.drive.normalize_path(path));
        let Some((parents, _)) = relative.rsplit_once('/') else {
            return Ok(());
        };

        let mut ancestor = String::new();
        let mut missing = false;
        for segment in parents.split('/') {
            if !ancestor.is_empty() {
                ancestor.push('/');
            }
            ancestor.push_str(segment);

            // Below a missing directory nothing can exist yet.
            if !missing && self.get_info(&ancestor).await?.is_none() {
                missing = true;
            }
            if missing {
                self.create_dir(&ancestor).await?;
            }
        }
        Ok(())
    }

    pub async fn create_file(&self, path: &str, source: &SyncFileInfo) -> Result<(), RemoteError> {
        let path = self.get_path(path);
        info!("creating remote file: {path}");

        if self.options.dry_run {
            return Ok(());
        }

        let created = self.drive.create(&path, &source.properties()).await?;
        debug!("created {} ({} bytes)", created.path, created.size.unwrap_or(0));
        Ok(())
    }

    pub async fn update_file(
        &mut self,
        path: &str,
        source: &SyncFileInfo,
        uploader: MediaUpload,
    ) -> Result<(), RemoteError> {
        let path = self.get_path(path);
        info!("updating remote file: {path}");

        self.bytes_written = 0;

        if self.options.dry_run {
            return Ok(());
        }

        let updated = self
            .drive
            .update(&path, &source.properties(), Some(uploader))
            .await?;
        self.bytes_written = updated.size.unwrap_or(0);
        debug!("wrote {} bytes to {path}", self.bytes_written);
        Ok(())
    }

    pub async fn update_stats(&self, path: &str, update: &StatUpdate) -> Result<(), RemoteError> {
        let path = self.get_path(path);
        info!("updating remote file stats: {path}");

        if self.options.dry_run {
            return Ok(());
        }
        if update.is_empty() {
            debug!("no stat attributes given for {path}");
            return Ok(());
        }

        let Some(mut info) = self.fetch_info(&path).await? else {
            return Ok(());
        };

        let mut stat = *info.stat_info();
        stat.apply(update);
        info.set_stat_info(stat)?;

        let properties = ResourceProperties {
            mime_type: None,
            description: info.description.clone(),
        };
        self.drive.update(&path, &properties, None).await?;
        Ok(())
    }

    async fn fetch_info(&self, path: &str) -> Result<Option<SyncFileInfo>, RemoteError> {
        debug!("fetching remote file metadata: {path}");

        let Some(resource) = self.drive.stat(path).await? else {
            debug!("file not found: {path}");
            return Ok(None);
        };

        let info = SyncFileInfo::from_resource(&resource)?;
        debug!("remote file metadata = {info:?}");
        if let Some(modified) = info.modified {
            debug!("remote mtime: {modified}");
        }
        Ok(Some(info))
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
