use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};

use crate::client::{DiskClient, DiskError, Resource};
use crate::media::{DEFAULT_MIME_TYPE, MediaUpload, RemoteReader};
use crate::paths;

/// Metadata written alongside an object on create/update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceProperties {
    pub mime_type: Option<String>,
    pub description: Option<String>,
}

impl ResourceProperties {
    pub fn is_empty(&self) -> bool {
        self.mime_type.is_none() && self.description.is_none()
    }

    pub fn to_custom_properties(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(mime_type) = &self.mime_type {
            map.insert("mime_type".into(), Value::String(mime_type.clone()));
        }
        if let Some(description) = &self.description {
            map.insert("description".into(), Value::String(description.clone()));
        }
        map
    }
}

/// The operations the sync side needs from a storage backend.
#[async_trait]
pub trait Drive: Send + Sync {
    fn normalize_path(&self, path: &str) -> String {
        paths::normalize_path(path)
    }

    fn strip_path(&self, path: &str) -> String {
        paths::strip_path(path)
    }

    /// `Ok(None)` when nothing exists at `path`.
    async fn stat(&self, path: &str) -> Result<Option<Resource>, DiskError>;

    /// `Ok(None)` when nothing exists at `path`.
    async fn open(&self, path: &str) -> Result<Option<RemoteReader>, DiskError>;

    async fn mkdir(&self, path: &str) -> Result<Resource, DiskError>;

    async fn create(
        &self,
        path: &str,
        properties: &ResourceProperties,
    ) -> Result<Resource, DiskError>;

    /// Replaces the content when `media` is given, then writes `properties`.
    async fn update(
        &self,
        path: &str,
        properties: &ResourceProperties,
        media: Option<MediaUpload>,
    ) -> Result<Resource, DiskError>;
}

fn not_found_as_none<T>(result: Result<T, DiskError>) -> Result<Option<T>, DiskError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

#[async_trait]
impl Drive for DiskClient {
    async fn stat(&self, path: &str) -> Result<Option<Resource>, DiskError> {
        not_found_as_none(self.get_resource(path).await)
    }

    async fn open(&self, path: &str) -> Result<Option<RemoteReader>, DiskError> {
        let Some(link) = not_found_as_none(self.get_download_link(path).await)? else {
            return Ok(None);
        };
        not_found_as_none(self.download(&link.href).await)
    }

    async fn mkdir(&self, path: &str) -> Result<Resource, DiskError> {
        self.create_folder(path).await
    }

    async fn create(
        &self,
        path: &str,
        properties: &ResourceProperties,
    ) -> Result<Resource, DiskError> {
        let mime_type = properties
            .mime_type
            .clone()
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        let link = self.get_upload_link(path, false).await?;
        self.upload(&link.href, MediaUpload::empty(mime_type)).await?;
        self.write_properties(path, properties).await
    }

    async fn update(
        &self,
        path: &str,
        properties: &ResourceProperties,
        media: Option<MediaUpload>,
    ) -> Result<Resource, DiskError> {
        if let Some(media) = media {
            let link = self.get_upload_link(path, true).await?;
            self.upload(&link.href, media).await?;
        }
        self.write_properties(path, properties).await
    }
}

impl DiskClient {
    async fn write_properties(
        &self,
        path: &str,
        properties: &ResourceProperties,
    ) -> Result<Resource, DiskError> {
        if properties.is_empty() {
            return self.get_resource(path).await;
        }
        self.update_custom_properties(path, &properties.to_custom_properties())
            .await
    }
}

/// Memoizes `stat` per normalized path. Writes through this wrapper drop the
/// entry they touch; writes made elsewhere need `invalidate_all`.
pub struct CachedDrive<D> {
    inner: D,
    entries: Mutex<HashMap<String, Option<Resource>>>,
}

impl<D: Drive> CachedDrive<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn invalidate(&self, path: &str) {
        let key = self.inner.normalize_path(path);
        self.lock_entries().remove(&key);
    }

    pub fn invalidate_all(&self) {
        self.lock_entries().clear();
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<Resource>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<D: Drive> Drive for CachedDrive<D> {
    fn normalize_path(&self, path: &str) -> String {
        self.inner.normalize_path(path)
    }

    fn strip_path(&self, path: &str) -> String {
        self.inner.strip_path(path)
    }

    async fn stat(&self, path: &str) -> Result<Option<Resource>, DiskError> {
        let key = self.inner.normalize_path(path);
        let cached = self.lock_entries().get(&key).cloned();
        if let Some(cached) = cached {
            debug!("stat cache hit: {key}");
            return Ok(cached);
        }
        let resource = self.inner.stat(path).await?;
        self.lock_entries().insert(key, resource.clone());
        Ok(resource)
    }

    async fn open(&self, path: &str) -> Result<Option<RemoteReader>, DiskError> {
        self.inner.open(path).await
    }

    async fn mkdir(&self, path: &str) -> Result<Resource, DiskError> {
        let result = self.inner.mkdir(path).await;
        self.invalidate(path);
        result
    }

    async fn create(
        &self,
        path: &str,
        properties: &ResourceProperties,
    ) -> Result<Resource, DiskError> {
        let result = self.inner.create(path, properties).await;
        self.invalidate(path);
        result
    }

    async fn update(
        &self,
        path: &str,
        properties: &ResourceProperties,
        media: Option<MediaUpload>,
    ) -> Result<Resource, DiskError> {
        let result = self.inner.update(path, properties, media).await;
        self.invalidate(path);
        result
    }
}
