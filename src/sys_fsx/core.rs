//! Rooted filesystem abstraction with optional, explicitly queried capabilities.
//!
//! Every [`Filesystem`] can open and stat entries. Writing, renaming, and
//! removing are capabilities a backend may or may not provide; callers look
//! them up with [`Filesystem::writable`] and friends, and the free helper
//! functions in this module fail with [`FsError::Unsupported`] when the
//! capability is absent. Open handles expose directory enumeration the same
//! way through [`FileHandle::as_enumerable`].
//!
//! Handles release their OS resources when dropped.

use std::{future::Future, io, pin::Pin, time::SystemTime};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum FsError {
    #[error("{op} {path}: file does not exist")]
    NotExist { op: &'static str, path: String },

    #[error("{op} {path}: permission denied")]
    PermissionDenied { op: &'static str, path: String },

    #[error("{op} {path}: file already exists")]
    Exists { op: &'static str, path: String },

    #[error("{op} {path}: invalid argument")]
    Invalid { op: &'static str, path: String },

    #[error("{op} {path}: operation not supported")]
    Unsupported { op: &'static str, path: String },

    #[error("{op} {path}: {source}")]
    Internal {
        op: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Classify an OS error, reporting the logical path rather than the on-disk one.
    pub fn from_io(op: &'static str, path: &str, err: io::Error) -> Self {
        let path = path.to_string();
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Self::NotExist { op, path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { op, path },
            io::ErrorKind::AlreadyExists => Self::Exists { op, path },
            io::ErrorKind::InvalidInput => Self::Invalid { op, path },
            _ => Self::Internal {
                op,
                path,
                source: err,
            },
        }
    }

    pub fn invalid(op: &'static str, path: &str) -> Self {
        Self::Invalid {
            op,
            path: path.to_string(),
        }
    }

    pub fn unsupported(op: &'static str, path: &str) -> Self {
        Self::Unsupported {
            op,
            path: path.to_string(),
        }
    }

    pub fn is_not_exist(&self) -> bool {
        matches!(self, Self::NotExist { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl EntryKind {
    pub fn from_file_type(ft: &std::fs::FileType) -> Self {
        if ft.is_symlink() {
            Self::Symlink
        } else if ft.is_dir() {
            Self::Dir
        } else if ft.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// Metadata of a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: SystemTime,
}

impl EntryMeta {
    pub fn from_std(name: &str, md: &std::fs::Metadata) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::from_file_type(&md.file_type()),
            size: md.len(),
            modified: md.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_regular(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

/// One directory entry as enumerated, without following symlinks.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Link-level metadata; `None` when it could not be read.
    pub info: Option<EntryMeta>,
}

impl DirEntry {
    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

pub trait SeekRead: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekRead for T {}

/// Readable body of an opened file.
pub enum Content {
    Seekable(Box<dyn SeekRead>),
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

#[async_trait]
pub trait Enumerable: Send {
    /// All entries of the directory, in whatever order the backend yields them.
    async fn read_dir(&mut self) -> Result<Vec<DirEntry>, FsError>;
}

#[async_trait]
pub trait FileHandle: Send {
    async fn stat(&self) -> Result<EntryMeta, FsError>;

    fn as_enumerable(&mut self) -> Option<&mut dyn Enumerable> {
        None
    }

    fn as_writer(&mut self) -> Option<&mut (dyn AsyncWrite + Send + Unpin)> {
        None
    }

    /// Consume the handle for reading its bytes.
    fn into_content(self: Box<Self>) -> Result<Content, FsError>;
}

#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Open an entry, following symlinks. `name` is slash-separated and
    /// relative to the root (`.` is the root itself).
    async fn open(&self, name: &str) -> Result<Box<dyn FileHandle>, FsError>;

    /// Metadata of an entry, following symlinks.
    async fn stat(&self, name: &str) -> Result<EntryMeta, FsError>;

    fn writable(&self) -> Option<&dyn Writable> {
        None
    }

    fn renamable(&self) -> Option<&dyn Renamable> {
        None
    }

    fn removable(&self) -> Option<&dyn Removable> {
        None
    }
}

#[async_trait]
pub trait Writable: Send + Sync {
    async fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<Box<dyn FileHandle>, FsError>;

    async fn make_dir(&self, name: &str, mode: u32) -> Result<(), FsError>;
}

#[async_trait]
pub trait Renamable: Send + Sync {
    async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), FsError>;
}

#[async_trait]
pub trait Removable: Send + Sync {
    /// Remove a file or an empty directory.
    async fn remove(&self, name: &str) -> Result<(), FsError>;
}

/// Flags for [`open_file`]. Exactly one access mode must be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags(u32);

impl OpenFlags {
    pub const READ_ONLY: Self = Self(0);
    pub const WRITE_ONLY: Self = Self(1);
    pub const READ_WRITE: Self = Self(2);

    pub const CREATE: Self = Self(1 << 4);
    pub const EXCLUSIVE: Self = Self(1 << 5);
    pub const TRUNCATE: Self = Self(1 << 6);
    pub const APPEND: Self = Self(1 << 7);

    const ACCESS_MASK: u32 = 0b11;

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn readable(self) -> bool {
        matches!(self.0 & Self::ACCESS_MASK, 0 | 2)
    }

    pub fn writable(self) -> bool {
        matches!(self.0 & Self::ACCESS_MASK, 1 | 2)
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Validate a root-relative name: unrooted, slash-separated, and free of
/// empty, `.` or `..` elements. The single name `.` denotes the root.
pub fn valid_path(name: &str) -> bool {
    if name == "." {
        return true;
    }
    name.split('/').all(|elem| !matches!(elem, "" | "." | ".."))
}

/// Join a child name onto a root-relative directory name.
pub fn join_name(dir: &str, child: &str) -> String {
    if dir == "." {
        child.to_string()
    } else {
        format!("{dir}/{child}")
    }
}

pub async fn open_file(
    fsys: &dyn Filesystem,
    name: &str,
    flags: OpenFlags,
    mode: u32,
) -> Result<Box<dyn FileHandle>, FsError> {
    let w = fsys
        .writable()
        .ok_or_else(|| FsError::unsupported("openfile", name))?;
    w.open_file(name, flags, mode).await
}

/// Create or truncate `name` and write `data` into it.
pub async fn write_file(
    fsys: &dyn Filesystem,
    name: &str,
    data: &[u8],
    mode: u32,
) -> Result<(), FsError> {
    let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE;
    let mut handle = open_file(fsys, name, flags, mode).await?;
    let writer = handle
        .as_writer()
        .ok_or_else(|| FsError::invalid("writefile", name))?;
    writer
        .write_all(data)
        .await
        .map_err(|e| FsError::from_io("writefile", name, e))?;
    writer
        .flush()
        .await
        .map_err(|e| FsError::from_io("writefile", name, e))
}

pub async fn make_dir(fsys: &dyn Filesystem, name: &str, mode: u32) -> Result<(), FsError> {
    let w = fsys
        .writable()
        .ok_or_else(|| FsError::unsupported("makedir", name))?;
    w.make_dir(name, mode).await
}

pub async fn rename(fsys: &dyn Filesystem, old_name: &str, new_name: &str) -> Result<(), FsError> {
    let r = fsys
        .renamable()
        .ok_or_else(|| FsError::unsupported("rename", &format!("{old_name} {new_name}")))?;
    r.rename(old_name, new_name).await
}

pub async fn remove(fsys: &dyn Filesystem, name: &str) -> Result<(), FsError> {
    let r = fsys
        .removable()
        .ok_or_else(|| FsError::unsupported("remove", name))?;
    r.remove(name).await
}

/// Remove `name` and everything below it. A missing entry is not an error.
/// Removes as much as it can and reports the first failure.
pub fn remove_all<'a>(
    fsys: &'a dyn Filesystem,
    name: &'a str,
) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>> {
    Box::pin(async move {
        let meta = match fsys.stat(name).await {
            Ok(meta) => meta,
            Err(e) if e.is_not_exist() => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut first_err = None;
        if meta.is_dir() {
            let mut handle = fsys.open(name).await?;
            let dir = handle
                .as_enumerable()
                .ok_or_else(|| FsError::invalid("removeall", name))?;
            let entries = dir.read_dir().await?;
            drop(handle);
            for entry in entries {
                let child = join_name(name, &entry.name);
                if let Err(e) = remove_all(fsys, &child).await {
                    first_err.get_or_insert(e);
                }
            }
        }

        let removed = remove(fsys, name).await;
        match first_err {
            Some(e) => Err(e),
            None => removed,
        }
    })
}
