//! Directory enumeration: symlink resolution, visibility filtering, index detection.
//! No hyper types here.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::{
    sys_access::core::AccessPatterns,
    sys_fsx::core::{EntryMeta, FileHandle, Filesystem, FsError, join_name},
    sys_path::core::RequestPath,
};

/// One visible entry of a listing. `name` never carries a trailing slash;
/// directories get one when rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub is_dir: bool,
    /// Zero unless the entry is a regular file.
    pub size: u64,
    pub modified: SystemTime,
}

impl EntryInfo {
    fn from_meta(name: &str, meta: &EntryMeta) -> Self {
        Self {
            name: name.to_string(),
            is_dir: meta.is_dir(),
            size: if meta.is_regular() { meta.size } else { 0 },
            modified: meta.modified,
        }
    }

    /// Name as shown and linked: directories end in `/`.
    pub fn display_name(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn unix_secs(&self) -> i64 {
        unix_secs(self.modified)
    }
}

/// Row of the client-side payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    pub name: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub date: i64,
}

impl From<&EntryInfo> for ListingRow {
    fn from(e: &EntryInfo) -> Self {
        Self {
            name: e.display_name(),
            size: e.size,
            date: e.unix_secs(),
        }
    }
}

pub fn unix_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Result of enumerating a directory.
pub enum Enumeration {
    /// The visible entries, in name order.
    Listing(Vec<EntryInfo>),
    /// An entry matched the index pattern and should be served instead.
    Index {
        path: RequestPath,
        meta: EntryMeta,
        handle: Box<dyn FileHandle>,
    },
}

/// Enumerate the open directory `dir` found at `path`.
///
/// Entries are visited in name order so that, when several entries match the
/// index pattern, the lexicographically first non-directory one wins.
/// Symlinks are resolved through `fsys`; a link that cannot be resolved is
/// dropped from the listing rather than failing the request.
pub async fn enumerate(
    fsys: &dyn Filesystem,
    patterns: &AccessPatterns,
    dir: &mut dyn FileHandle,
    path: &RequestPath,
) -> Result<Enumeration, FsError> {
    let dir_name = path.fs_name();
    let reader = dir
        .as_enumerable()
        .ok_or_else(|| FsError::invalid("readdir", &dir_name))?;
    let mut entries = reader.read_dir().await?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut infos = Vec::with_capacity(entries.len());
    for entry in entries {
        let meta = if entry.is_symlink() {
            match fsys.stat(&join_name(&dir_name, &entry.name)).await {
                Ok(meta) => Some(meta),
                Err(e) => {
                    log::debug!("dropping unresolvable link {}: {e}", entry.name);
                    None
                }
            }
        } else {
            entry.info
        };
        let Some(meta) = meta else {
            continue;
        };

        let url_path = path.join_entry(&entry.name);
        if is_filtered(patterns, url_path.as_str(), meta.is_dir()) {
            continue;
        }
        if !meta.is_dir() && patterns.is_index(url_path.as_str()) {
            let handle = fsys.open(&join_name(&dir_name, &entry.name)).await?;
            return Ok(Enumeration::Index {
                path: url_path,
                meta,
                handle,
            });
        }

        infos.push(EntryInfo::from_meta(&entry.name, &meta));
    }
    Ok(Enumeration::Listing(infos))
}

/// Directories are tested in both forms, `/a` and `/a/`, the same way
/// direct requests are checked for deny.
fn is_filtered(patterns: &AccessPatterns, url_path: &str, is_dir: bool) -> bool {
    patterns.is_hidden(url_path) || (is_dir && patterns.is_hidden(&format!("{url_path}/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys_fsx::dir::DirFs;
    use std::fs;

    async fn list(root: &std::path::Path, patterns: &AccessPatterns, path: &str) -> Enumeration {
        let fsys = DirFs::new(root);
        let path = RequestPath::normalize(path);
        let mut dir = fsys.open(&path.fs_name()).await.expect("open dir");
        enumerate(&fsys, patterns, dir.as_mut(), &path)
            .await
            .expect("enumerate")
    }

    fn names(e: &Enumeration) -> Vec<String> {
        match e {
            Enumeration::Listing(infos) => infos.iter().map(EntryInfo::display_name).collect(),
            Enumeration::Index { path, .. } => panic!("unexpected index {path}"),
        }
    }

    #[tokio::test]
    async fn lists_files_and_directories_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.txt"), b"0123456789").unwrap();
        fs::create_dir(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("C.md"), b"").unwrap();

        let got = list(tmp.path(), &AccessPatterns::default(), "/").await;
        assert_eq!(names(&got), ["C.md", "a/", "b.txt"]);

        let Enumeration::Listing(infos) = got else { unreachable!() };
        assert_eq!(infos[1].size, 0, "directories report no size");
        assert_eq!(infos[2].size, 10);
    }

    #[tokio::test]
    async fn hidden_and_denied_entries_are_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".env"), b"").unwrap();
        fs::write(tmp.path().join("key.pem"), b"").unwrap();
        fs::write(tmp.path().join("ok.txt"), b"").unwrap();
        let patterns = AccessPatterns::compile("/[.][^/]+/?$", "[.]pem$", "").unwrap();

        let got = list(tmp.path(), &patterns, "/").await;
        assert_eq!(names(&got), ["ok.txt"]);
    }

    #[tokio::test]
    async fn slash_form_patterns_filter_directories() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("private")).unwrap();
        fs::create_dir(tmp.path().join("public")).unwrap();
        fs::write(tmp.path().join("private.txt"), b"").unwrap();
        let patterns = AccessPatterns::compile("", "/private/$", "").unwrap();

        let got = list(tmp.path(), &patterns, "/").await;
        assert_eq!(names(&got), ["private.txt", "public/"]);
    }

    #[tokio::test]
    async fn first_index_match_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("b");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("index.htm"), b"htm").unwrap();
        fs::write(sub.join("index.html"), b"html").unwrap();
        let patterns = AccessPatterns::compile("", "", "/index[.]html?$").unwrap();

        match list(tmp.path(), &patterns, "/b/").await {
            Enumeration::Index { path, meta, .. } => {
                assert_eq!(path.as_str(), "/b/index.htm");
                assert_eq!(meta.size, 3);
            }
            Enumeration::Listing(_) => panic!("expected index"),
        }
    }

    #[tokio::test]
    async fn directories_never_count_as_index() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("index.html")).unwrap();
        let patterns = AccessPatterns::compile("", "", "/index[.]html$").unwrap();

        let got = list(tmp.path(), &patterns, "/").await;
        assert_eq!(names(&got), ["index.html/"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn broken_symlinks_vanish_and_good_ones_resolve() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("target.txt"), b"12345").unwrap();
        fs::create_dir(tmp.path().join("dir")).unwrap();
        std::os::unix::fs::symlink("target.txt", tmp.path().join("link.txt")).unwrap();
        std::os::unix::fs::symlink("dir", tmp.path().join("linkdir")).unwrap();
        std::os::unix::fs::symlink("missing", tmp.path().join("broken")).unwrap();

        let got = list(tmp.path(), &AccessPatterns::default(), "/").await;
        assert_eq!(names(&got), ["dir/", "link.txt", "linkdir/", "target.txt"]);

        let Enumeration::Listing(infos) = got else { unreachable!() };
        assert_eq!(infos[1].size, 5, "link reports its target's size");
    }

    #[tokio::test]
    async fn files_cannot_be_enumerated() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), b"").unwrap();
        let fsys = DirFs::new(tmp.path());
        let mut file = fsys.open("a.txt").await.expect("open");
        let path = RequestPath::normalize("/a.txt/");
        let res = enumerate(&fsys, &AccessPatterns::default(), file.as_mut(), &path).await;
        assert!(matches!(res, Err(FsError::Invalid { .. })));
    }

    #[test]
    fn rows_carry_display_names() {
        let e = EntryInfo {
            name: "docs".into(),
            is_dir: true,
            size: 0,
            modified: UNIX_EPOCH + std::time::Duration::from_secs(60),
        };
        let row = ListingRow::from(&e);
        assert_eq!(row.name, "docs/");
        assert_eq!(row.date, 60);
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"name":"docs/","size":0,"date":60}"#
        );
    }
}
