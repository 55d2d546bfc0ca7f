use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use disksync_core::{DEFAULT_MIME_TYPE, Resource, ResourceProperties, ResourceType};
use log::debug;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const DEFAULT_FILE_MODE: u32 = 0o100644;
pub const DEFAULT_DIR_MODE: u32 = 0o040755;
pub const DIRECTORY_MIME_TYPE: &str = "inode/directory";

/// POSIX-style attributes carried in a remote object's description.
///
/// Only `mode` is required when decoding. A description without it, or with
/// keys this record does not know, is not an encoded stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatInfo {
    pub mode: u32,
    #[serde(default)]
    pub ino: u64,
    #[serde(default)]
    pub dev: u64,
    #[serde(default)]
    pub nlink: u64,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub atime: i64,
    #[serde(default)]
    pub mtime: i64,
    #[serde(default)]
    pub ctime: i64,
}

impl StatInfo {
    fn synthesized(resource_type: ResourceType, size: u64, modified: Option<i64>) -> Self {
        let time = modified.unwrap_or(0);
        Self {
            mode: match resource_type {
                ResourceType::File => DEFAULT_FILE_MODE,
                ResourceType::Dir => DEFAULT_DIR_MODE,
            },
            nlink: 1,
            size,
            atime: time,
            mtime: time,
            ctime: time,
            ..Self::default()
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(description: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(description)
    }

    pub fn apply(&mut self, update: &StatUpdate) {
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(uid) = update.uid {
            self.uid = uid;
        }
        if let Some(gid) = update.gid {
            self.gid = gid;
        }
        if let Some(atime) = update.atime {
            self.atime = atime;
        }
        if let Some(mtime) = update.mtime {
            self.mtime = mtime;
        }
    }
}

/// Subset of attributes to overlay; `None` leaves the current value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatUpdate {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub atime: Option<i64>,
    pub mtime: Option<i64>,
}

impl StatUpdate {
    pub fn from_stat(stat: &StatInfo) -> Self {
        Self {
            mode: Some(stat.mode),
            uid: Some(stat.uid),
            gid: Some(stat.gid),
            atime: Some(stat.atime),
            mtime: Some(stat.mtime),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncFileInfo {
    pub path: String,
    pub name: String,
    pub resource_type: ResourceType,
    pub mime_type: String,
    pub size: u64,
    pub modified: Option<OffsetDateTime>,
    pub md5: Option<String>,
    pub resource_id: Option<String>,
    pub description: Option<String>,
    stat_info: StatInfo,
}

impl SyncFileInfo {
    pub fn from_resource(resource: &Resource) -> Result<Self, time::error::Parse> {
        let modified = resource
            .modified
            .as_deref()
            .map(|value| OffsetDateTime::parse(value, &Rfc3339))
            .transpose()?;
        let size = resource.size.unwrap_or(0);
        let description = resource.description().map(str::to_string);

        let decoded = description
            .as_deref()
            .and_then(|value| match StatInfo::decode(value) {
                Ok(stat) => Some(stat),
                Err(err) => {
                    debug!("ignoring undecodable description on {}: {err}", resource.path);
                    None
                }
            });
        let stat_info = decoded.unwrap_or_else(|| {
            StatInfo::synthesized(
                resource.resource_type,
                size,
                modified.map(OffsetDateTime::unix_timestamp),
            )
        });

        let mime_type = resource
            .mime_type
            .clone()
            .or_else(|| resource.custom_property("mime_type").map(str::to_string))
            .unwrap_or_else(|| default_mime_type(resource.resource_type).to_string());

        Ok(Self {
            path: resource.path.clone(),
            name: resource.name.clone(),
            resource_type: resource.resource_type,
            mime_type,
            size,
            modified,
            md5: resource.md5.clone(),
            resource_id: resource.resource_id.clone(),
            description,
            stat_info,
        })
    }

    pub fn from_local(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let resource_type = if meta.is_dir() {
            ResourceType::Dir
        } else {
            ResourceType::File
        };
        let stat_info = StatInfo {
            mode: meta.mode(),
            ino: meta.ino(),
            dev: meta.dev(),
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.size(),
            atime: meta.atime(),
            mtime: meta.mtime(),
            ctime: meta.ctime(),
        };
        let description = stat_info.encode().map_err(io::Error::other)?;

        Ok(Self {
            path: path.display().to_string(),
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            resource_type,
            mime_type: default_mime_type(resource_type).to_string(),
            size: meta.size(),
            modified: OffsetDateTime::from_unix_timestamp(meta.mtime()).ok(),
            md5: None,
            resource_id: None,
            description: Some(description),
            stat_info,
        })
    }

    pub fn stat_info(&self) -> &StatInfo {
        &self.stat_info
    }

    /// Replaces the attributes and re-encodes the description from them.
    pub fn set_stat_info(&mut self, stat_info: StatInfo) -> Result<(), serde_json::Error> {
        self.description = Some(stat_info.encode()?);
        self.stat_info = stat_info;
        Ok(())
    }

    pub fn properties(&self) -> ResourceProperties {
        ResourceProperties {
            mime_type: Some(self.mime_type.clone()),
            description: self.description.clone(),
        }
    }
}

fn default_mime_type(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::File => DEFAULT_MIME_TYPE,
        ResourceType::Dir => DIRECTORY_MIME_TYPE,
    }
}
