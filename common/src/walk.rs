//! Paginated depth-first traversal of the remote namespace.
//!
//! The walk is strictly sequential: one stat, one page read at a time.
//! Pending directories live on an explicit stack so traversal depth is
//! bounded by memory rather than call-stack size.

use std::collections::VecDeque;

use crate::remote::{DirectoryStream, FileStatus, NsPath, RemoteError, RemoteFilesystem};

/// Matches the page size the namespace servers are tuned for.
pub const DEFAULT_PAGE_SIZE: usize = 100;

const HIDDEN_PREFIX: char = '.';

#[derive(Debug, Clone, Copy)]
pub struct WalkSettings {
    /// Descend into subdirectories of the root.
    pub recursive: bool,
    /// List a directory argument as a plain entry instead of its contents.
    pub dirs_as_plain: bool,
    pub page_size: usize,
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            recursive: false,
            dirs_as_plain: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Reads an open directory stream in fixed-size pages, tracking
/// end-of-stream so the underlying handle is polled exactly until done.
pub struct DirPager<S> {
    stream: S,
    page_size: usize,
    done: bool,
}

impl<S: DirectoryStream> DirPager<S> {
    pub fn new(stream: S, page_size: usize) -> Self {
        Self {
            stream,
            page_size,
            done: false,
        }
    }

    /// Next page of entries in stream order, `None` once exhausted. Errors
    /// are fatal; there is no partial-page retry.
    pub async fn next_page(&mut self) -> Result<Option<Vec<FileStatus>>, RemoteError> {
        if self.done {
            return Ok(None);
        }
        let (entries, done) = self.stream.read_page(self.page_size).await?;
        if done {
            self.done = true;
            if entries.is_empty() {
                return Ok(None);
            }
        }
        Ok(Some(entries))
    }
}

struct Frame<S> {
    pager: DirPager<S>,
    pending: VecDeque<FileStatus>,
}

impl<S: DirectoryStream> Frame<S> {
    fn new(stream: S, page_size: usize) -> Self {
        Self {
            pager: DirPager::new(stream, page_size),
            pending: VecDeque::new(),
        }
    }
}

/// Walk `root`, handing every emitted entry to `emit` in traversal order.
///
/// A plain-file root is emitted as-is. A directory root is expanded into its
/// children (recursively with [`WalkSettings::recursive`]); nested
/// directories emit their own entry before their contents. Entries whose
/// name starts with `.` are skipped entirely, including descent. Children
/// appear in directory-stream order within a page and in page-arrival order
/// across pages; no re-sort is performed.
///
/// Any stat, open or page-read error aborts the walk immediately; entries
/// already handed to `emit` stay emitted.
pub async fn walk<R, F>(
    remote: &R,
    root: &NsPath,
    settings: &WalkSettings,
    mut emit: F,
) -> Result<(), RemoteError>
where
    R: RemoteFilesystem,
    F: FnMut(&FileStatus),
{
    let status = remote.stat(root).await?;
    if !status.is_dir() || settings.dirs_as_plain {
        emit(&status);
        return Ok(());
    }
    let mut stack = vec![Frame::new(
        remote.open_dir(root).await?,
        settings.page_size,
    )];
    loop {
        let Some(frame) = stack.last_mut() else {
            break;
        };
        let entry = match frame.pending.pop_front() {
            Some(entry) => entry,
            None => match frame.pager.next_page().await? {
                Some(page) => {
                    frame.pending.extend(page);
                    continue;
                }
                None => {
                    stack.pop();
                    continue;
                }
            },
        };
        if entry.name().starts_with(HIDDEN_PREFIX) {
            continue;
        }
        let child = remote.stat(&entry.path).await?;
        emit(&child);
        if child.is_dir() && settings.recursive {
            let stream = remote.open_dir(&child.path).await?;
            stack.push(Frame::new(stream, settings.page_size));
        }
    }
    Ok(())
}
