use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::remote::{
    ns_join, DirectoryStream, FileKind, FileStatus, NsPath, RemoteError, RemoteFilesystem,
};

pub async fn create_temp_dir() -> anyhow::Result<std::path::PathBuf> {
    let mut idx = 0;
    loop {
        let tmp_dir = std::env::temp_dir().join(format!("dfs_test{}", &idx));
        if let Err(error) = tokio::fs::create_dir(&tmp_dir).await {
            match error.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    idx += 1;
                }
                _ => return Err(error.into()),
            }
        } else {
            return Ok(tmp_dir);
        }
    }
}

/// Lay out the canned local tree used by the upload tests:
/// src
/// |- a.txt
/// |- sub
///    |- b.txt
///    |- c.txt
pub async fn setup_local_tree() -> anyhow::Result<std::path::PathBuf> {
    let tmp_dir = create_temp_dir().await?;
    let src_path = tmp_dir.join("src");
    tokio::fs::create_dir(&src_path).await.unwrap();
    tokio::fs::write(src_path.join("a.txt"), "aaa").await.unwrap();
    let sub_path = src_path.join("sub");
    tokio::fs::create_dir(&sub_path).await.unwrap();
    tokio::fs::write(sub_path.join("b.txt"), "bb").await.unwrap();
    tokio::fs::write(sub_path.join("c.txt"), "c").await.unwrap();
    Ok(tmp_dir)
}

#[derive(Default)]
struct MemoryState {
    // directory path -> child names in insertion (stream) order
    dirs: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<u8>>,
    fail_stats: HashSet<String>,
    fail_reads: HashSet<String>,
    fail_creates: HashSet<String>,
    fail_mkdirs: HashSet<String>,
    fail_writes: HashSet<String>,
    mkdir_calls: usize,
    create_calls: usize,
}

/// In-memory [`RemoteFilesystem`] with deterministic per-path failure
/// injection, for exercising traversal and transfer semantics without a
/// live namespace.
#[derive(Clone)]
pub struct MemoryFs {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.dirs.insert("/".to_string(), Vec::new());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn add_dir(&self, path: &str) {
        let mut state = self.lock();
        register_child(&mut state, path);
        state.dirs.insert(path.to_string(), Vec::new());
    }

    pub fn add_file(&self, path: &str, contents: &[u8]) {
        let mut state = self.lock();
        register_child(&mut state, path);
        state.files.insert(path.to_string(), contents.to_vec());
    }

    pub fn fail_stat_of(&self, path: &str) {
        self.lock().fail_stats.insert(path.to_string());
    }

    pub fn fail_reads_of(&self, path: &str) {
        self.lock().fail_reads.insert(path.to_string());
    }

    pub fn fail_create_at(&self, path: &str) {
        self.lock().fail_creates.insert(path.to_string());
    }

    pub fn fail_mkdir_at(&self, path: &str) {
        self.lock().fail_mkdirs.insert(path.to_string());
    }

    /// Make the write stream for `path` error on its first write, after
    /// `create` has already succeeded.
    pub fn fail_writes_to(&self, path: &str) {
        self.lock().fail_writes.insert(path.to_string());
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains_key(path)
    }

    pub fn mkdir_calls(&self) -> usize {
        self.lock().mkdir_calls
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    fn status_of(state: &MemoryState, path: &str) -> Option<FileStatus> {
        if state.dirs.contains_key(path) {
            Some(make_status(path, FileKind::Directory, 0))
        } else {
            state
                .files
                .get(path)
                .map(|contents| make_status(path, FileKind::File, contents.len() as u64))
        }
    }
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None => "/".to_string(),
    }
}

fn register_child(state: &mut MemoryState, path: &str) {
    let parent = parent_of(path);
    let name = path.rsplit('/').next().unwrap_or("").to_string();
    let children = state
        .dirs
        .get_mut(&parent)
        .unwrap_or_else(|| panic!("parent directory {parent:?} missing for {path:?}"));
    if !children.contains(&name) {
        children.push(name);
    }
}

fn make_status(path: &str, kind: FileKind, size: u64) -> FileStatus {
    FileStatus {
        path: path.to_string(),
        kind,
        mode: if kind == FileKind::Directory { 0o755 } else { 0o644 },
        owner: "hdfs".to_string(),
        group: "hadoop".to_string(),
        size,
        replication: if kind == FileKind::File { 3 } else { 0 },
        modified: std::time::SystemTime::UNIX_EPOCH
            + std::time::Duration::from_secs(1_000_000_000),
    }
}

fn injected_error(path: &str) -> RemoteError {
    RemoteError::Io(std::io::Error::other(format!("injected failure at {path:?}")))
}

pub struct MemoryDirStream {
    fs: MemoryFs,
    dir: String,
    entries: std::vec::IntoIter<FileStatus>,
}

impl DirectoryStream for MemoryDirStream {
    async fn read_page(
        &mut self,
        page_size: usize,
    ) -> Result<(Vec<FileStatus>, bool), RemoteError> {
        if self.fs.lock().fail_reads.contains(&self.dir) {
            return Err(injected_error(&self.dir));
        }
        let page: Vec<FileStatus> = self.entries.by_ref().take(page_size).collect();
        // end-of-stream is reported on the call after the final non-empty page
        let done = page.is_empty();
        Ok((page, done))
    }
}

pub struct MemoryWriter {
    fs: MemoryFs,
    path: String,
    buf: Vec<u8>,
    fail_writes: bool,
    committed: bool,
}

impl MemoryWriter {
    fn commit(&mut self) {
        if !self.committed {
            self.committed = true;
            let mut state = self.fs.lock();
            let contents = std::mem::take(&mut self.buf);
            state.files.insert(self.path.clone(), contents);
        }
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.commit();
    }
}

impl tokio::io::AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        if self.fail_writes {
            return std::task::Poll::Ready(Err(std::io::Error::other(format!(
                "injected write failure at {:?}",
                self.path
            ))));
        }
        self.buf.extend_from_slice(buf);
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        self.commit();
        std::task::Poll::Ready(Ok(()))
    }
}

impl RemoteFilesystem for MemoryFs {
    type DirStream = MemoryDirStream;
    type Writer = MemoryWriter;

    async fn stat(&self, path: &NsPath) -> Result<FileStatus, RemoteError> {
        let state = self.lock();
        if state.fail_stats.contains(path) {
            return Err(injected_error(path));
        }
        MemoryFs::status_of(&state, path).ok_or_else(|| RemoteError::NotFound {
            path: path.to_string(),
        })
    }

    async fn open_dir(&self, path: &NsPath) -> Result<Self::DirStream, RemoteError> {
        let entries = {
            let state = self.lock();
            let children = state.dirs.get(path).ok_or_else(|| RemoteError::NotFound {
                path: path.to_string(),
            })?;
            children
                .iter()
                .filter_map(|name| MemoryFs::status_of(&state, &ns_join(path, name)))
                .collect::<Vec<_>>()
        };
        Ok(MemoryDirStream {
            fs: self.clone(),
            dir: path.to_string(),
            entries: entries.into_iter(),
        })
    }

    async fn create(&self, path: &NsPath) -> Result<Self::Writer, RemoteError> {
        let fail_writes = {
            let mut state = self.lock();
            state.create_calls += 1;
            if state.fail_creates.contains(path) {
                return Err(injected_error(path));
            }
            let parent = parent_of(path);
            if !state.dirs.contains_key(&parent) {
                return Err(RemoteError::NotFound { path: parent });
            }
            register_child(&mut state, path);
            state.fail_writes.contains(path)
        };
        Ok(MemoryWriter {
            fs: self.clone(),
            path: path.to_string(),
            buf: Vec::new(),
            fail_writes,
            committed: false,
        })
    }

    async fn mkdir(&self, path: &NsPath, _mode: u32) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.mkdir_calls += 1;
        if state.fail_mkdirs.contains(path) {
            return Err(injected_error(path));
        }
        if state.dirs.contains_key(path) || state.files.contains_key(path) {
            return Err(RemoteError::AlreadyExists {
                path: path.to_string(),
            });
        }
        let parent = parent_of(path);
        if !state.dirs.contains_key(&parent) {
            return Err(RemoteError::NotFound { path: parent });
        }
        register_child(&mut state, path);
        state.dirs.insert(path.to_string(), Vec::new());
        Ok(())
    }
}
