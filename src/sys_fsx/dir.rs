//! Disk-backed [`Filesystem`] rooted at a directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::{fs, io::AsyncWrite};

use crate::sys_fsx::core::{
    Content, DirEntry, EntryKind, EntryMeta, Enumerable, FileHandle, Filesystem, FsError,
    OpenFlags, Removable, Renamable, Writable, valid_path,
};

/// Filesystem rooted at `root`. Names are validated with [`valid_path`]
/// before they are joined, so no name can climb above the root lexically.
/// Symlinks are followed wherever they point.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn join(&self, op: &'static str, name: &str) -> Result<PathBuf, FsError> {
        if self.root.as_os_str().is_empty() || !valid_path(name) {
            return Err(FsError::invalid(op, name));
        }
        if name == "." {
            return Ok(self.root.clone());
        }
        Ok(name.split('/').fold(self.root.clone(), |acc, seg| acc.join(seg)))
    }
}

fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[async_trait]
impl Filesystem for DirFs {
    async fn open(&self, name: &str) -> Result<Box<dyn FileHandle>, FsError> {
        let full = self.join("open", name)?;
        let md = fs::metadata(&full)
            .await
            .map_err(|e| FsError::from_io("open", name, e))?;
        if md.is_dir() {
            return Ok(Box::new(DirHandle {
                name: name.to_string(),
                full,
            }));
        }
        let file = fs::File::open(&full)
            .await
            .map_err(|e| FsError::from_io("open", name, e))?;
        Ok(Box::new(OsFile {
            name: name.to_string(),
            file,
        }))
    }

    async fn stat(&self, name: &str) -> Result<EntryMeta, FsError> {
        let full = self.join("stat", name)?;
        let md = fs::metadata(&full)
            .await
            .map_err(|e| FsError::from_io("stat", name, e))?;
        Ok(EntryMeta::from_std(base_name(name), &md))
    }

    fn writable(&self) -> Option<&dyn Writable> {
        Some(self)
    }

    fn renamable(&self) -> Option<&dyn Renamable> {
        Some(self)
    }

    fn removable(&self) -> Option<&dyn Removable> {
        Some(self)
    }
}

#[async_trait]
impl Writable for DirFs {
    async fn open_file(
        &self,
        name: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<Box<dyn FileHandle>, FsError> {
        let full = self.join("open", name)?;
        let mut opts = fs::OpenOptions::new();
        opts.read(flags.readable())
            .write(flags.writable())
            .append(flags.contains(OpenFlags::APPEND))
            .truncate(flags.contains(OpenFlags::TRUNCATE));
        if flags.contains(OpenFlags::CREATE) {
            if flags.contains(OpenFlags::EXCLUSIVE) {
                opts.create_new(true);
            } else {
                opts.create(true);
            }
        }
        #[cfg(unix)]
        opts.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;

        let file = opts
            .open(&full)
            .await
            .map_err(|e| FsError::from_io("open", name, e))?;
        Ok(Box::new(OsFile {
            name: name.to_string(),
            file,
        }))
    }

    async fn make_dir(&self, name: &str, mode: u32) -> Result<(), FsError> {
        let full = self.join("mkdir", name)?;
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        builder
            .create(&full)
            .await
            .map_err(|e| FsError::from_io("mkdir", name, e))
    }
}

#[async_trait]
impl Renamable for DirFs {
    async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), FsError> {
        let old_full = self.join("rename", old_name)?;
        let new_full = self.join("rename", new_name)?;
        fs::rename(&old_full, &new_full)
            .await
            .map_err(|e| FsError::from_io("rename", &format!("{old_name} {new_name}"), e))
    }
}

#[async_trait]
impl Removable for DirFs {
    async fn remove(&self, name: &str) -> Result<(), FsError> {
        let full = self.join("remove", name)?;
        let md = fs::symlink_metadata(&full)
            .await
            .map_err(|e| FsError::from_io("remove", name, e))?;
        let res = if md.is_dir() {
            fs::remove_dir(&full).await
        } else {
            fs::remove_file(&full).await
        };
        res.map_err(|e| FsError::from_io("remove", name, e))
    }
}

/// An open directory. Enumeration reads the directory on demand.
struct DirHandle {
    name: String,
    full: PathBuf,
}

#[async_trait]
impl FileHandle for DirHandle {
    async fn stat(&self) -> Result<EntryMeta, FsError> {
        let md = fs::metadata(&self.full)
            .await
            .map_err(|e| FsError::from_io("stat", &self.name, e))?;
        Ok(EntryMeta::from_std(base_name(&self.name), &md))
    }

    fn as_enumerable(&mut self) -> Option<&mut dyn Enumerable> {
        Some(self)
    }

    fn into_content(self: Box<Self>) -> Result<Content, FsError> {
        Err(FsError::invalid("read", &self.name))
    }
}

#[async_trait]
impl Enumerable for DirHandle {
    async fn read_dir(&mut self) -> Result<Vec<DirEntry>, FsError> {
        let mut rd = fs::read_dir(&self.full)
            .await
            .map_err(|e| FsError::from_io("readdir", &self.name, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| FsError::from_io("readdir", &self.name, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                log::debug!("skipping non UTF-8 entry in {}", self.name);
                continue;
            };
            let kind = match entry.file_type().await {
                Ok(ft) => EntryKind::from_file_type(&ft),
                Err(_) => EntryKind::Other,
            };
            // DirEntry::metadata does not traverse symlinks.
            let info = entry
                .metadata()
                .await
                .ok()
                .map(|md| EntryMeta::from_std(&name, &md));
            entries.push(DirEntry { name, kind, info });
        }
        Ok(entries)
    }
}

struct OsFile {
    name: String,
    file: fs::File,
}

#[async_trait]
impl FileHandle for OsFile {
    async fn stat(&self) -> Result<EntryMeta, FsError> {
        let md = self
            .file
            .metadata()
            .await
            .map_err(|e| FsError::from_io("stat", &self.name, e))?;
        Ok(EntryMeta::from_std(base_name(&self.name), &md))
    }

    fn as_writer(&mut self) -> Option<&mut (dyn AsyncWrite + Send + Unpin)> {
        Some(&mut self.file)
    }

    fn into_content(self: Box<Self>) -> Result<Content, FsError> {
        Ok(Content::Seekable(Box::new(self.file)))
    }
}
