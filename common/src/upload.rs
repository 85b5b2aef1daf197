//! Local-to-remote copy: destination resolution and the upload walk.
//!
//! Resolution happens once, before any byte is transferred. The walk itself
//! follows the continue-with-tally policy: a failed entry is reported and
//! counted, and the remaining tree is still attempted; the final result is
//! an error iff any entry failed. Root-level failures (source stat,
//! destination resolution) abort before the walk starts.

use anyhow::{anyhow, Context};
use tokio::io::AsyncWriteExt;

use crate::remote::{ns_join, NsPath, RemoteError, RemoteFilesystem};

/// Mode applied to every directory created on the remote side.
pub const DIR_MODE: u32 = 0o755;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// The requested destination did not exist; the source is copied to
    /// exactly that path.
    RenameInto,
    /// The requested destination is an existing directory; the source is
    /// nested under it by base name.
    PlaceInside,
}

/// Where an upload lands, decided once per invocation and read-only after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    pub source: std::path::PathBuf,
    pub destination: String,
    pub copy_mode: CopyMode,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The requested destination exists and is not a directory; nothing may
    /// be overwritten, so the whole operation stops here.
    #[error("'{path}': destination exists and is not a directory")]
    Conflict { path: String },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Decide the final remote path for `source` uploaded to `requested`.
///
/// Only a not-found stat permits creating the destination anew; any other
/// stat failure is terminal.
pub async fn resolve<R: RemoteFilesystem>(
    remote: &R,
    source: &std::path::Path,
    requested: &NsPath,
) -> Result<UploadPlan, ResolveError> {
    match remote.stat(requested).await {
        Ok(existing) if existing.is_dir() => {
            let name = source.file_name().ok_or_else(|| {
                ResolveError::Remote(RemoteError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("source {source:?} has no base name"),
                )))
            })?;
            Ok(UploadPlan {
                source: source.to_path_buf(),
                destination: ns_join(requested, &name.to_string_lossy()),
                copy_mode: CopyMode::PlaceInside,
            })
        }
        Ok(_) => Err(ResolveError::Conflict {
            path: requested.to_string(),
        }),
        Err(error) if error.is_not_found() => Ok(UploadPlan {
            source: source.to_path_buf(),
            destination: requested.to_string(),
            copy_mode: CopyMode::RenameInto,
        }),
        Err(error) => Err(error.into()),
    }
}

#[derive(Copy, Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub bytes_copied: u64,
    pub files_copied: usize,
    pub directories_created: usize,
    pub directories_unchanged: usize,
    pub entries_failed: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_copied: self.bytes_copied + other.bytes_copied,
            files_copied: self.files_copied + other.files_copied,
            directories_created: self.directories_created + other.directories_created,
            directories_unchanged: self.directories_unchanged + other.directories_unchanged,
            entries_failed: self.entries_failed + other.entries_failed,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes copied: {}\n\
            files copied: {}\n\
            directories created: {}\n\
            directories unchanged: {}\n\
            entries failed: {}",
            bytesize::ByteSize(self.bytes_copied),
            self.files_copied,
            self.directories_created,
            self.directories_unchanged,
            self.entries_failed,
        )
    }
}

/// Error type for upload operations that preserves the operation summary
/// even on failure; the Display implementation shows the full error chain.
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }
}

enum Work {
    Dir(std::path::PathBuf, String),
    File(std::path::PathBuf, String),
}

/// Mirror the local tree at `plan.source` under `plan.destination`.
///
/// Directories are created with [`DIR_MODE`]; files are streamed one at a
/// time, each reader/writer pair released before the next entry starts.
/// The local tree is visited depth-first in name order.
pub async fn upload<R: RemoteFilesystem>(
    remote: &R,
    plan: &UploadPlan,
) -> Result<Summary, Error> {
    let root_md = tokio::fs::symlink_metadata(&plan.source)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &plan.source))
        .map_err(|err| Error::new(err, Summary::default()))?;
    let mut summary = Summary::default();
    let mut stack = if root_md.is_dir() {
        vec![Work::Dir(plan.source.clone(), plan.destination.clone())]
    } else {
        vec![Work::File(plan.source.clone(), plan.destination.clone())]
    };
    while let Some(work) = stack.pop() {
        match work {
            Work::Dir(dir, target) => {
                make_dir(remote, &dir, &target, &mut summary).await;
                match read_children(&dir).await {
                    Ok(children) => {
                        // reversed so the stack pops them back in name order
                        for (path, is_dir) in children.into_iter().rev() {
                            let name = path
                                .file_name()
                                .unwrap_or_default()
                                .to_string_lossy()
                                .into_owned();
                            let child_target = ns_join(&target, &name);
                            if is_dir {
                                stack.push(Work::Dir(path, child_target));
                            } else {
                                stack.push(Work::File(path, child_target));
                            }
                        }
                    }
                    Err(error) => {
                        tracing::error!("put: cannot read directory {:?}: {:#}", &dir, &error);
                        summary.entries_failed += 1;
                    }
                }
            }
            Work::File(path, target) => match copy_file(remote, &path, &target).await {
                Ok(bytes) => {
                    summary.files_copied += 1;
                    summary.bytes_copied += bytes;
                }
                Err(error) => {
                    tracing::error!("put: {:?} -> '{}' failed: {:#}", &path, &target, &error);
                    summary.entries_failed += 1;
                }
            },
        }
    }
    if summary.entries_failed > 0 {
        return Err(Error::new(
            anyhow!(
                "put: {:?} -> '{}': {} entries failed",
                &plan.source,
                &plan.destination,
                summary.entries_failed
            ),
            summary,
        ));
    }
    Ok(summary)
}

/// Stream `reader` (typically stdin) straight into a single remote file.
/// No tree walk and no destination resolution beyond the given path.
pub async fn upload_stream<R: RemoteFilesystem>(
    remote: &R,
    mut reader: impl tokio::io::AsyncRead + Unpin,
    destination: &NsPath,
) -> Result<Summary, Error> {
    let mut writer = remote
        .create(destination)
        .await
        .with_context(|| format!("cannot create '{destination}'"))
        .map_err(|err| Error::new(err, Summary::default()))?;
    let bytes = tokio::io::copy(&mut reader, &mut writer)
        .await
        .with_context(|| format!("failed writing to '{destination}'"))
        .map_err(|err| Error::new(err, Summary::default()))?;
    writer
        .shutdown()
        .await
        .with_context(|| format!("failed closing '{destination}'"))
        .map_err(|err| Error::new(err, Summary::default()))?;
    Ok(Summary {
        bytes_copied: bytes,
        files_copied: 1,
        ..Default::default()
    })
}

async fn make_dir<R: RemoteFilesystem>(
    remote: &R,
    dir: &std::path::Path,
    target: &NsPath,
    summary: &mut Summary,
) {
    match remote.mkdir(target, DIR_MODE).await {
        Ok(()) => summary.directories_created += 1,
        Err(RemoteError::AlreadyExists { .. }) => {
            // an existing directory is left as is; anything else conflicts
            match remote.stat(target).await {
                Ok(existing) if existing.is_dir() => summary.directories_unchanged += 1,
                _ => {
                    tracing::error!("put: '{}' exists and is not a directory", target);
                    summary.entries_failed += 1;
                }
            }
        }
        Err(error) => {
            tracing::error!("put: mkdir '{}' for {:?} failed: {:#}", target, dir, &error);
            summary.entries_failed += 1;
        }
    }
}

async fn read_children(
    dir: &std::path::Path,
) -> anyhow::Result<Vec<(std::path::PathBuf, bool)>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot open directory {dir:?} for reading"))?;
    let mut children = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {dir:?}"))?
    {
        let file_type = entry
            .file_type()
            .await
            .with_context(|| format!("failed reading type of {:?}", entry.path()))?;
        children.push((entry.path(), file_type.is_dir()));
    }
    // local readdir order is arbitrary; name order keeps the walk stable
    children.sort_by(|(a, _), (b, _)| a.file_name().cmp(&b.file_name()));
    Ok(children)
}

async fn copy_file<R: RemoteFilesystem>(
    remote: &R,
    src: &std::path::Path,
    target: &NsPath,
) -> anyhow::Result<u64> {
    let mut reader = tokio::fs::File::open(src)
        .await
        .with_context(|| format!("cannot open {src:?} for reading"))?;
    let mut writer = remote
        .create(target)
        .await
        .with_context(|| format!("cannot create '{target}'"))?;
    let bytes = tokio::io::copy(&mut reader, &mut writer)
        .await
        .with_context(|| format!("failed copying {src:?} to '{target}'"))?;
    writer
        .shutdown()
        .await
        .with_context(|| format!("failed closing '{target}'"))?;
    Ok(bytes)
}
