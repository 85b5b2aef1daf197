//! The client-side seam to the remote namespace.
//!
//! The wire protocol is out of scope for these tools; everything above it is
//! written against the [`RemoteFilesystem`] trait so that backends (and test
//! doubles) can be swapped without touching the traversal or transfer code.

use tokio::io::AsyncWrite;

/// Namespace paths are slash-separated and absolute, e.g. `/data/logs`.
pub type NsPath = str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// One entry in the remote (or mounted) namespace, as returned by `stat` and
/// directory reads. Immutable once produced.
#[derive(Debug, Clone)]
pub struct FileStatus {
    /// Absolute slash-separated path within the namespace.
    pub path: String,
    pub kind: FileKind,
    /// Permission bits (lower 12 bits of the unix mode).
    pub mode: u32,
    pub owner: String,
    pub group: String,
    pub size: u64,
    /// Block replication factor; 0 when the backend has no notion of it.
    pub replication: u32,
    pub modified: std::time::SystemTime,
}

impl FileStatus {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Final path component, e.g. `logs` for `/data/logs`. The namespace
    /// root `/` has an empty name.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }
}

/// Join a child name onto a namespace path.
pub fn ns_join(parent: &NsPath, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("'{path}': No such file or directory")]
    NotFound { path: String },
    #[error("'{path}': File exists")]
    AlreadyExists { path: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// An open directory handle yielding entries in bounded-size pages.
///
/// Entries come back in whatever order the underlying stream produces them;
/// no entry is skipped or duplicated across pages. After the final page the
/// stream reports end-of-stream exactly once via `done`.
#[allow(async_fn_in_trait)]
pub trait DirectoryStream {
    /// Fetch up to `page_size` entries. `done == true` means the stream is
    /// exhausted and no further calls will yield entries.
    async fn read_page(&mut self, page_size: usize)
        -> Result<(Vec<FileStatus>, bool), RemoteError>;
}

/// The stateful client handle. One instance spans an entire command; the
/// tools never issue two calls against it concurrently.
#[allow(async_fn_in_trait)]
pub trait RemoteFilesystem {
    type DirStream: DirectoryStream;
    type Writer: AsyncWrite + Unpin;

    async fn stat(&self, path: &NsPath) -> Result<FileStatus, RemoteError>;
    async fn open_dir(&self, path: &NsPath) -> Result<Self::DirStream, RemoteError>;
    async fn create(&self, path: &NsPath) -> Result<Self::Writer, RemoteError>;
    async fn mkdir(&self, path: &NsPath, mode: u32) -> Result<(), RemoteError>;
}
