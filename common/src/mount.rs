//! [`RemoteFilesystem`] backend over a locally mounted view of the remote
//! namespace (e.g. a FUSE or NFS mount of the distributed store).
//!
//! Namespace paths map onto the mount root: `/data/logs` becomes
//! `<mount>/data/logs`. All metadata is read with `symlink_metadata` so
//! symlinks show up as themselves rather than their targets.

use std::os::unix::fs::{MetadataExt, PermissionsExt};

use crate::remote::{
    ns_join, DirectoryStream, FileKind, FileStatus, NsPath, RemoteError, RemoteFilesystem,
};

#[derive(Debug, Clone)]
pub struct MountedFs {
    root: std::path::PathBuf,
}

impl MountedFs {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn to_local(&self, path: &NsPath) -> Result<std::path::PathBuf, RemoteError> {
        let rel = path.strip_prefix('/').ok_or_else(|| {
            RemoteError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("namespace path must be absolute: {path:?}"),
            ))
        })?;
        Ok(self.root.join(rel))
    }

    fn status_from(path: String, md: &std::fs::Metadata) -> FileStatus {
        let kind = if md.is_dir() {
            FileKind::Directory
        } else if md.file_type().is_symlink() {
            FileKind::Symlink
        } else {
            FileKind::File
        };
        FileStatus {
            path,
            kind,
            mode: md.permissions().mode() & 0o7777,
            owner: owner_name(md.uid()),
            group: group_name(md.gid()),
            size: md.len(),
            replication: 0,
            modified: md.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        }
    }
}

fn owner_name(uid: u32) -> String {
    match nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

fn group_name(gid: u32) -> String {
    match nix::unistd::Group::from_gid(nix::unistd::Gid::from_raw(gid)) {
        Ok(Some(group)) => group.name,
        _ => gid.to_string(),
    }
}

fn map_io(path: &NsPath, error: std::io::Error) -> RemoteError {
    match error.kind() {
        std::io::ErrorKind::NotFound => RemoteError::NotFound {
            path: path.to_string(),
        },
        std::io::ErrorKind::AlreadyExists => RemoteError::AlreadyExists {
            path: path.to_string(),
        },
        _ => RemoteError::Io(error),
    }
}

pub struct MountedDirStream {
    ns_path: String,
    inner: tokio::fs::ReadDir,
}

impl DirectoryStream for MountedDirStream {
    async fn read_page(
        &mut self,
        page_size: usize,
    ) -> Result<(Vec<FileStatus>, bool), RemoteError> {
        let mut entries = Vec::new();
        while entries.len() < page_size {
            let Some(entry) = self
                .inner
                .next_entry()
                .await
                .map_err(|err| map_io(&self.ns_path, err))?
            else {
                break;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let md = entry
                .metadata()
                .await
                .map_err(|err| map_io(&self.ns_path, err))?;
            entries.push(MountedFs::status_from(ns_join(&self.ns_path, &name), &md));
        }
        // end-of-stream is reported on the call after the final non-empty page
        let done = entries.is_empty();
        Ok((entries, done))
    }
}

impl RemoteFilesystem for MountedFs {
    type DirStream = MountedDirStream;
    type Writer = tokio::fs::File;

    async fn stat(&self, path: &NsPath) -> Result<FileStatus, RemoteError> {
        let local = self.to_local(path)?;
        let md = tokio::fs::symlink_metadata(&local)
            .await
            .map_err(|err| map_io(path, err))?;
        Ok(Self::status_from(path.to_string(), &md))
    }

    async fn open_dir(&self, path: &NsPath) -> Result<Self::DirStream, RemoteError> {
        let local = self.to_local(path)?;
        let inner = tokio::fs::read_dir(&local)
            .await
            .map_err(|err| map_io(path, err))?;
        Ok(MountedDirStream {
            ns_path: path.to_string(),
            inner,
        })
    }

    async fn create(&self, path: &NsPath) -> Result<Self::Writer, RemoteError> {
        let local = self.to_local(path)?;
        tokio::fs::File::create(&local)
            .await
            .map_err(|err| map_io(path, err))
    }

    async fn mkdir(&self, path: &NsPath, mode: u32) -> Result<(), RemoteError> {
        let local = self.to_local(path)?;
        tokio::fs::create_dir(&local)
            .await
            .map_err(|err| map_io(path, err))?;
        tokio::fs::set_permissions(&local, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|err| map_io(path, err))
    }
}
