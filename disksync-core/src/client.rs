use std::io;

use futures_util::StreamExt;
use log::debug;
use reqwest::{Body, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::io::{ReaderStream, StreamReader};
use url::Url;

use crate::media::{MediaUpload, RemoteReader};

pub const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net";

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("api response missing embedded items")]
    MissingEmbedded,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone)]
pub struct DiskClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DiskClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DiskError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DiskError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn get_resource(&self, path: &str) -> Result<Resource, DiskError> {
        let mut url = self.endpoint("/v1/disk/resources")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn create_folder(&self, path: &str) -> Result<Resource, DiskError> {
        let mut url = self.endpoint("/v1/disk/resources")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .put(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        // Folder creation answers with a link to the new resource, not the resource itself.
        let _: Link = Self::handle_response(response).await?;
        self.get_resource(path).await
    }

    /// Replaces the given keys of the resource's custom properties. A `null`
    /// value removes the key on the server.
    pub async fn update_custom_properties(
        &self,
        path: &str,
        properties: &Map<String, Value>,
    ) -> Result<Resource, DiskError> {
        let mut url = self.endpoint("/v1/disk/resources")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header_value())
            .json(&json!({ "custom_properties": properties }))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn list_directory(
        &self,
        path: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<ResourceList, DiskError> {
        let mut url = self.endpoint("/v1/disk/resources")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("path", path);
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(offset) = offset {
                query.append_pair("offset", &offset.to_string());
            }
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let payload: ResourceListResponse = Self::handle_response(response).await?;
        payload.embedded.ok_or(DiskError::MissingEmbedded)
    }

    pub async fn list_directory_all(
        &self,
        path: &str,
        page_size: u32,
    ) -> Result<Vec<Resource>, DiskError> {
        let page_size = page_size.max(1);
        let mut offset = 0u32;
        let mut items = Vec::new();
        loop {
            let page = self
                .list_directory(path, Some(page_size), Some(offset))
                .await?;
            let fetched = page.items.len() as u32;
            offset = offset.saturating_add(fetched);
            let total = page.total;
            items.extend(page.items);
            if fetched == 0 || offset >= total {
                break;
            }
        }
        Ok(items)
    }

    pub async fn get_download_link(&self, path: &str) -> Result<Link, DiskError> {
        let mut url = self.endpoint("/v1/disk/resources/download")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn get_upload_link(&self, path: &str, overwrite: bool) -> Result<Link, DiskError> {
        let mut url = self.endpoint("/v1/disk/resources/upload")?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("overwrite", if overwrite { "true" } else { "false" });
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Sends the media to an upload href. Resumable media is streamed in
    /// chunks; anything else is read fully and sent in a single body.
    pub async fn upload(&self, href: &Url, media: MediaUpload) -> Result<(), DiskError> {
        let mime_type = media.mime_type().to_string();
        let resumable = media.is_resumable();
        let chunk_size = media.chunk_size();
        let mut reader = media.into_reader();

        let body = if resumable {
            Body::wrap_stream(ReaderStream::with_capacity(reader, chunk_size))
        } else {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer).await?;
            Body::from(buffer)
        };

        debug!("uploading {mime_type} to {href} (resumable: {resumable})");
        let response = self
            .http
            .put(href.clone())
            .header("Content-Type", mime_type)
            .body(body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    pub async fn download(&self, href: &Url) -> Result<RemoteReader, DiskError> {
        let response = self.http.get(href.clone()).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DiskError::Api { status, body });
        }
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(io::Error::other));
        Ok(RemoteReader::new(StreamReader::new(stream)))
    }

    fn auth_header_value(&self) -> String {
        format!("OAuth {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DiskError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DiskError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DiskError::Api { status, body })
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<(), DiskError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DiskError::Api { status, body })
        }
    }
}

impl DiskError {
    /// HTTP status of a rejected API call.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DiskError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Resource {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub custom_properties: Option<Map<String, Value>>,
}

impl Resource {
    pub fn custom_property(&self, key: &str) -> Option<&str> {
        self.custom_properties
            .as_ref()
            .and_then(|props| props.get(key))
            .and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.custom_property("description")
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Dir,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResourceList {
    pub items: Vec<Resource>,
    pub limit: u32,
    pub offset: u32,
    pub total: u32,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResourceListResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<ResourceList>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Link {
    pub href: Url,
    pub method: String,
    #[serde(default)]
    pub templated: bool,
}
