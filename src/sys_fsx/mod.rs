pub mod core;
pub mod dir;

pub use self::core::{
    Content, DirEntry, EntryKind, EntryMeta, Enumerable, FileHandle, Filesystem, FsError,
    OpenFlags,
};
pub use self::dir::DirFs;
