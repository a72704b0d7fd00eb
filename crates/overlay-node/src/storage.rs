//! Persistent state objects for the protocol engine.
//!
//! The engine hands us an object kind and a two-word id; each kind maps
//! through [`StateObjectKind::layout`] to a path under the base directory and
//! a permission class. Writes are atomic (write to a scratch sibling, then
//! rename).

use std::io::Write;
use std::path::{Path, PathBuf};

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateObjectKind {
    IdentityPublic,
    IdentitySecret,
    Peer,
    NetworkConfig,
    Roots,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    /// Readable by group and world.
    Shared,
    /// Owner read/write only.
    Secret,
}

impl Permission {
    pub const fn mode(self) -> u32 {
        match self {
            Permission::Shared => 0o644,
            Permission::Secret => 0o600,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PathTemplate {
    File(&'static str),
    /// `<dir>/<10 hex digits>.<ext>`, keyed by id[0] as a node address.
    PerAddress {
        dir: &'static str,
        ext: &'static str,
    },
    /// `<dir>/<16 hex digits>.<ext>`, keyed by id[0] as a network id.
    PerNetwork {
        dir: &'static str,
        ext: &'static str,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    template: PathTemplate,
    pub permission: Permission,
    pub dir_mode: u32,
}

impl StateObjectKind {
    pub const ALL: [StateObjectKind; 5] = [
        StateObjectKind::IdentityPublic,
        StateObjectKind::IdentitySecret,
        StateObjectKind::Peer,
        StateObjectKind::NetworkConfig,
        StateObjectKind::Roots,
    ];

    pub const fn layout(self) -> Layout {
        match self {
            StateObjectKind::IdentityPublic => Layout {
                template: PathTemplate::File("identity.public"),
                permission: Permission::Shared,
                dir_mode: 0o755,
            },
            StateObjectKind::IdentitySecret => Layout {
                template: PathTemplate::File("identity.secret"),
                permission: Permission::Secret,
                dir_mode: 0o755,
            },
            StateObjectKind::Peer => Layout {
                template: PathTemplate::PerAddress {
                    dir: "peers.d",
                    ext: "peer",
                },
                permission: Permission::Secret,
                dir_mode: 0o700,
            },
            StateObjectKind::NetworkConfig => Layout {
                template: PathTemplate::PerNetwork {
                    dir: "networks.d",
                    ext: "conf",
                },
                permission: Permission::Shared,
                dir_mode: 0o755,
            },
            StateObjectKind::Roots => Layout {
                template: PathTemplate::File("roots"),
                permission: Permission::Shared,
                dir_mode: 0o755,
            },
        }
    }
}

/// File-backed store for engine state objects.
#[derive(Debug, Clone)]
pub struct StateStore {
    base_dir: PathBuf,
}

impl StateStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Canonical path for an object. Does not touch the filesystem.
    pub fn path(&self, kind: StateObjectKind, id: [u64; 2]) -> PathBuf {
        match kind.layout().template {
            PathTemplate::File(name) => self.base_dir.join(name),
            PathTemplate::PerAddress { dir, ext } => self
                .base_dir
                .join(dir)
                .join(format!("{:010x}.{ext}", id[0] & 0xff_ffff_ffff)),
            PathTemplate::PerNetwork { dir, ext } => {
                self.base_dir.join(dir).join(format!("{:016x}.{ext}", id[0]))
            }
        }
    }

    /// Returns `Ok(None)` if the object does not exist.
    pub fn get(&self, kind: StateObjectKind, id: [u64; 2]) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(self.path(kind, id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Write an object, or delete it when `data` is `None`.
    pub fn put(
        &self,
        kind: StateObjectKind,
        id: [u64; 2],
        data: Option<&[u8]>,
    ) -> Result<(), StorageError> {
        let Some(data) = data else {
            return self.delete(kind, id);
        };
        let layout = kind.layout();
        let path = self.path(kind, id);
        if let Some(parent) = path.parent()
            && parent != self.base_dir
        {
            create_dir(parent, layout.dir_mode)?;
        }
        atomic_write(&path, data, layout.permission.mode())?;
        Ok(())
    }

    /// Deleting an absent object is not an error.
    pub fn delete(&self, kind: StateObjectKind, id: [u64; 2]) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(kind, id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Create a directory (and parents) with the given mode on Unix.
pub(crate) fn create_dir(path: &Path, mode: u32) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

/// Write to a uniquely named temporary sibling and rename it over the
/// target, so concurrent writers of one path never share a scratch file.
/// The mode is set on the open handle before the rename so that neither a
/// pre-existing file nor the umask can leave a secret readable.
pub(crate) fn atomic_write(path: &Path, data: &[u8], mode: u32) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
