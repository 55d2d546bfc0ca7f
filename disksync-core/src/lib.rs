mod client;
mod drive;
mod media;
pub mod paths;

pub use client::{DEFAULT_BASE_URL, DiskClient, DiskError, Link, Resource, ResourceList, ResourceType};
pub use drive::{CachedDrive, Drive, ResourceProperties};
pub use media::{DEFAULT_CHUNK_SIZE, DEFAULT_MIME_TYPE, MediaUpload, RemoteReader};
