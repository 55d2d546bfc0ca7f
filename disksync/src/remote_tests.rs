use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use disksync_core::{RemoteReader, Resource, ResourceType};
use tokio::io::AsyncReadExt;

use super::*;
use crate::file_info::StatInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Stat(String),
    Open(String),
    Mkdir(String),
    Create(String),
    Update { path: String, with_media: bool },
}

impl Call {
    fn is_mutating(&self) -> bool {
        matches!(self, Call::Mkdir(_) | Call::Create(_) | Call::Update { .. })
    }
}

/// In-memory drive that records every call it receives.
#[derive(Default)]
struct RecordingDrive {
    resources: Mutex<HashMap<String, Resource>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
    unreadable: bool,
}

impl RecordingDrive {
    fn with_file(self, path: &str, content: &[u8], description: Option<&str>) -> Self {
        let mut resource = resource(path, ResourceType::File, content.len() as u64);
        if let Some(description) = description {
            let mut props = serde_json::Map::new();
            props.insert("description".into(), description.into());
            resource.custom_properties = Some(props);
        }
        self.resources
            .lock()
            .unwrap()
            .insert(path.to_string(), resource);
        self.contents
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn mutating_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_mutating)
            .collect()
    }

    fn resource(&self, path: &str) -> Option<Resource> {
        self.resources.lock().unwrap().get(path).cloned()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn resource(path: &str, resource_type: ResourceType, size: u64) -> Resource {
    Resource {
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or_default().to_string(),
        resource_type,
        size: Some(size),
        modified: Some("2024-03-01T12:00:00Z".to_string()),
        mime_type: Some("text/plain".to_string()),
        resource_id: None,
        md5: None,
        custom_properties: None,
    }
}

#[async_trait]
impl Drive for RecordingDrive {
    async fn stat(&self, path: &str) -> Result<Option<Resource>, DiskError> {
        self.record(Call::Stat(path.to_string()));
        Ok(self.resource(path))
    }

    async fn open(&self, path: &str) -> Result<Option<RemoteReader>, DiskError> {
        self.record(Call::Open(path.to_string()));
        if self.unreadable {
            return Ok(None);
        }
        let content = self.contents.lock().unwrap().get(path).cloned();
        Ok(content.map(|bytes| RemoteReader::new(std::io::Cursor::new(bytes))))
    }

    async fn mkdir(&self, path: &str) -> Result<Resource, DiskError> {
        self.record(Call::Mkdir(path.to_string()));
        let created = resource(path, ResourceType::Dir, 0);
        self.resources
            .lock()
            .unwrap()
            .insert(path.to_string(), created.clone());
        Ok(created)
    }

    async fn create(
        &self,
        path: &str,
        properties: &ResourceProperties,
    ) -> Result<Resource, DiskError> {
        self.record(Call::Create(path.to_string()));
        let mut created = resource(path, ResourceType::File, 0);
        created.custom_properties = Some(properties.to_custom_properties());
        self.resources
            .lock()
            .unwrap()
            .insert(path.to_string(), created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        path: &str,
        properties: &ResourceProperties,
        media: Option<MediaUpload>,
    ) -> Result<Resource, DiskError> {
        self.record(Call::Update {
            path: path.to_string(),
            with_media: media.is_some(),
        });
        let mut current = self
            .resource(path)
            .unwrap_or_else(|| resource(path, ResourceType::File, 0));
        if let Some(media) = media {
            let mut reader = media.into_reader();
            let mut content = Vec::new();
            reader.read_to_end(&mut content).await?;
            current.size = Some(content.len() as u64);
            self.contents
                .lock()
                .unwrap()
                .insert(path.to_string(), content);
        }
        if !properties.is_empty() {
            current.custom_properties = Some(properties.to_custom_properties());
        }
        self.resources
            .lock()
            .unwrap()
            .insert(path.to_string(), current.clone());
        Ok(current)
    }
}

fn adapter(drive: RecordingDrive, dry_run: bool) -> RemoteFile<RecordingDrive> {
    RemoteFile::new(
        drive,
        SyncOptions::default().with_dry_run(dry_run),
        "disk:/Backup",
    )
}

fn local_source(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf, SyncFileInfo) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.txt");
    std::fs::write(&path, content).unwrap();
    let info = SyncFileInfo::from_local(&path).unwrap();
    (dir, path, info)
}

#[test]
fn root_is_normalized_on_construction() {
    let remote = RemoteFile::new(
        RecordingDrive::default(),
        SyncOptions::default(),
        "disk://Backup//./daily/",
    );
    assert_eq!(remote.get_path(""), "disk:/Backup/daily");
}

#[test]
fn get_path_joins_relative_paths_under_root() {
    let remote = adapter(RecordingDrive::default(), false);

    assert_eq!(remote.get_path(""), "disk:/Backup");
    assert_eq!(remote.get_path("Docs/A.txt"), "disk:/Backup/Docs/A.txt");
    assert_eq!(remote.get_path("/Docs/A.txt"), "disk:/Backup/Docs/A.txt");
    assert_eq!(remote.get_path("disk:/Docs/./x/../A.txt"), "disk:/Backup/Docs/A.txt");
}

#[test]
fn get_path_is_stable_under_renormalization() {
    let remote = adapter(RecordingDrive::default(), false);
    for relative in ["a/b", "./a//b/", "a/../b", "../../c"] {
        let resolved = remote.get_path(relative);
        assert_eq!(remote.drive().normalize_path(&resolved), resolved);
    }
}

#[tokio::test]
async fn get_info_returns_none_for_missing_object() {
    let remote = adapter(RecordingDrive::default(), false);

    let info = remote.get_info("nope.txt").await.unwrap();

    assert!(info.is_none());
    assert_eq!(
        remote.drive().calls(),
        vec![Call::Stat("disk:/Backup/nope.txt".into())]
    );
}

#[tokio::test]
async fn get_info_reads_resource_metadata() {
    let drive = RecordingDrive::default().with_file("disk:/Backup/A.txt", b"hello", None);
    let remote = adapter(drive, false);

    let info = remote.get_info("A.txt").await.unwrap().unwrap();

    assert_eq!(info.size, 5);
    assert_eq!(info.mime_type, "text/plain");
    assert!(info.modified.is_some());
}

#[tokio::test]
async fn get_uploader_wraps_remote_stream() {
    let drive = RecordingDrive::default().with_file("disk:/Backup/A.txt", b"remote bytes", None);
    let remote = adapter(drive, false);

    let media = remote.get_uploader("A.txt").await.unwrap();
    assert!(media.is_resumable());
    assert_eq!(media.mime_type(), "text/plain");

    let mut reader = media.into_reader();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, b"remote bytes");
}

#[tokio::test]
async fn get_uploader_fails_without_metadata() {
    let remote = adapter(RecordingDrive::default(), false);

    let err = remote.get_uploader("missing.txt").await.unwrap_err();

    assert!(matches!(err, RemoteError::InfoUnavailable(path) if path == "disk:/Backup/missing.txt"));
}

#[tokio::test]
async fn get_uploader_fails_when_stream_unavailable() {
    let drive = RecordingDrive {
        unreadable: true,
        ..RecordingDrive::default()
    }
    .with_file("disk:/Backup/A.txt", b"x", None);
    let remote = adapter(drive, false);

    let err = remote.get_uploader("A.txt").await.unwrap_err();

    assert!(matches!(err, RemoteError::OpenFailed(path) if path == "disk:/Backup/A.txt"));
}

#[tokio::test]
async fn dry_run_issues_no_mutating_calls() {
    let drive = RecordingDrive::default().with_file("disk:/Backup/A.txt", b"old", None);
    let mut remote = adapter(drive, true);
    let (_dir, source_path, source) = local_source(b"new content");

    remote.create_dir("Docs").await.unwrap();
    remote.create_file("Docs/B.txt", &source).await.unwrap();
    let media = MediaUpload::from_path(&source_path, "text/plain")
        .await
        .unwrap();
    remote.update_file("A.txt", &source, media).await.unwrap();
    remote
        .update_stats(
            "A.txt",
            &StatUpdate {
                mode: Some(0o100600),
                ..StatUpdate::default()
            },
        )
        .await
        .unwrap();

    assert!(remote.drive().mutating_calls().is_empty());
    assert!(remote.drive().calls().is_empty());
    assert_eq!(remote.bytes_written(), 0);
}

#[tokio::test]
async fn create_dir_delegates_to_backend() {
    let remote = adapter(RecordingDrive::default(), false);

    remote.create_dir("Docs").await.unwrap();

    assert_eq!(
        remote.drive().calls(),
        vec![Call::Mkdir("disk:/Backup/Docs".into())]
    );
}

#[tokio::test]
async fn create_file_carries_source_metadata() {
    let remote = adapter(RecordingDrive::default(), false);
    let (_dir, _path, source) = local_source(b"abc");

    remote.create_file("B.txt", &source).await.unwrap();

    let created = remote.drive().resource("disk:/Backup/B.txt").unwrap();
    let stat = StatInfo::decode(created.description().unwrap()).unwrap();
    assert_eq!(stat, *source.stat_info());
    assert_eq!(created.custom_property("mime_type"), Some(source.mime_type.as_str()));
}

#[tokio::test]
async fn update_file_tracks_bytes_written() {
    let drive = RecordingDrive::default().with_file("disk:/Backup/A.txt", b"old", None);
    let mut remote = adapter(drive, false);
    let (_dir, source_path, source) = local_source(b"twelve bytes");

    let media = MediaUpload::from_path(&source_path, source.mime_type.clone())
        .await
        .unwrap()
        .resumable(true);
    remote.update_file("A.txt", &source, media).await.unwrap();

    assert_eq!(remote.bytes_written(), 12);
    assert_eq!(
        remote.drive().mutating_calls(),
        vec![Call::Update {
            path: "disk:/Backup/A.txt".into(),
            with_media: true
        }]
    );
}

#[tokio::test]
async fn update_stats_overlays_only_supplied_attributes() {
    let original = StatInfo {
        mode: 0o100644,
        ino: 11,
        dev: 12,
        nlink: 1,
        uid: 1000,
        gid: 1000,
        size: 3,
        atime: 100,
        mtime: 200,
        ctime: 300,
    };
    let drive = RecordingDrive::default().with_file(
        "disk:/Backup/A.txt",
        b"abc",
        Some(&original.encode().unwrap()),
    );
    let remote = adapter(drive, false);

    remote
        .update_stats(
            "A.txt",
            &StatUpdate {
                mode: Some(0o100755),
                mtime: Some(999),
                ..StatUpdate::default()
            },
        )
        .await
        .unwrap();

    let stored = remote.drive().resource("disk:/Backup/A.txt").unwrap();
    let stat = StatInfo::decode(stored.description().unwrap()).unwrap();
    assert_eq!(
        stat,
        StatInfo {
            mode: 0o100755,
            mtime: 999,
            ..original
        }
    );
    assert_eq!(
        remote.drive().mutating_calls(),
        vec![Call::Update {
            path: "disk:/Backup/A.txt".into(),
            with_media: false
        }]
    );
}

#[tokio::test]
async fn update_stats_on_missing_object_writes_nothing() {
    let remote = adapter(RecordingDrive::default(), false);

    remote
        .update_stats(
            "gone.txt",
            &StatUpdate {
                uid: Some(1),
                ..StatUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        remote.drive().calls(),
        vec![Call::Stat("disk:/Backup/gone.txt".into())]
    );
}

#[tokio::test]
async fn update_stats_with_empty_subset_skips_backend() {
    let drive = RecordingDrive::default().with_file("disk:/Backup/A.txt", b"abc", None);
    let remote = adapter(drive, false);

    remote
        .update_stats("A.txt", &StatUpdate::default())
        .await
        .unwrap();

    assert!(remote.drive().calls().is_empty());
}

#[tokio::test]
async fn create_parent_dirs_builds_missing_chain_outermost_first() {
    let drive = RecordingDrive::default();
    drive.resources.lock().unwrap().insert(
        "disk:/Backup/a".to_string(),
        resource("disk:/Backup/a", ResourceType::Dir, 0),
    );
    let remote = adapter(drive, false);

    remote.create_parent_dirs("a/b/c/file.txt").await.unwrap();

    assert_eq!(
        remote.drive().calls(),
        vec![
            Call::Stat("disk:/Backup/a".into()),
            Call::Stat("disk:/Backup/a/b".into()),
            Call::Mkdir("disk:/Backup/a/b".into()),
            Call::Mkdir("disk:/Backup/a/b/c".into()),
        ]
    );
}

#[tokio::test]
async fn create_parent_dirs_at_top_level_touches_nothing() {
    let remote = adapter(RecordingDrive::default(), false);

    remote.create_parent_dirs("file.txt").await.unwrap();
    remote.create_parent_dirs("").await.unwrap();

    assert!(remote.drive().calls().is_empty());
}

#[tokio::test]
async fn create_parent_dirs_under_dry_run_only_reads() {
    let remote = adapter(RecordingDrive::default(), true);

    remote.create_parent_dirs("x/y/file.txt").await.unwrap();

    assert_eq!(
        remote.drive().calls(),
        vec![Call::Stat("disk:/Backup/x".into())]
    );
}
