pub mod file_info;
pub mod options;
pub mod remote;

pub use file_info::{StatInfo, StatUpdate, SyncFileInfo};
pub use options::{ClientConfig, SyncOptions};
pub use remote::{RemoteError, RemoteFile};
