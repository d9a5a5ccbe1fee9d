//! Request resolution: deny check, trailing-slash canonicalization, and the
//! directory-vs-file branch. No hyper types here; `handlers` turns a
//! [`Resolution`] into a response.

use std::time::SystemTime;

use crate::{
    errors::ServeError,
    sys_access::core::AccessPatterns,
    sys_content::core::redirects_to_directory,
    sys_fsx::core::{Content, EntryMeta, FileHandle, Filesystem},
    sys_listing::core::{EntryInfo, Enumeration, enumerate},
    sys_path::core::RequestPath,
};

/// What a request path resolved to.
pub enum Resolution {
    /// Permanent redirect to a path relative to the current URL (unencoded,
    /// no query string).
    Redirect(String),
    /// Visible entries of a directory, in name order.
    Listing {
        path: RequestPath,
        entries: Vec<EntryInfo>,
    },
    /// File content to hand to the transfer primitive. `path` is the
    /// logical path, which differs from the request path for index files.
    File {
        path: RequestPath,
        modified: SystemTime,
        content: Content,
    },
}

/// Resolve `path` against `fsys`.
///
/// Denied paths are rejected before anything is opened, so the answer is
/// the same whether or not the entry exists.
pub async fn resolve(
    fsys: &dyn Filesystem,
    patterns: &AccessPatterns,
    path: &RequestPath,
) -> Result<Resolution, ServeError> {
    if is_denied(patterns, path) {
        return Err(ServeError::Forbidden(format!(
            "open {}: permission denied",
            path.fs_name()
        )));
    }

    let mut handle = fsys.open(&path.fs_name()).await?;
    let meta = handle.stat().await?;

    if let Some(target) = slash_redirect(path, meta.is_dir()) {
        return Ok(Resolution::Redirect(target));
    }

    if !meta.is_dir() {
        return serve_file(patterns, path.clone(), meta, handle, true);
    }

    match enumerate(fsys, patterns, handle.as_mut(), path).await? {
        Enumeration::Listing(entries) => Ok(Resolution::Listing {
            path: path.clone(),
            entries,
        }),
        Enumeration::Index { path, meta, handle } => serve_file(patterns, path, meta, handle, false),
    }
}

/// A directory must be addressed with a trailing slash and a file without
/// one. Returns the relative target when the request gets it wrong.
pub fn slash_redirect(path: &RequestPath, is_dir: bool) -> Option<String> {
    match (is_dir, path.has_trailing_slash()) {
        (true, false) => Some(format!("{}/", path.base())),
        (false, true) => Some(format!("../{}", path.base())),
        _ => None,
    }
}

/// Whether a listing was asked for as data (`?format=json`), as the
/// client engine does when it refreshes.
pub fn wants_json(query: Option<&str>) -> bool {
    query.is_some_and(|q| q.split('&').any(|pair| pair == "format=json"))
}

/// Deny is checked against the path both with and without its trailing
/// slash, so `/secret/` is refused whenever `/secret` would be.
fn is_denied(patterns: &AccessPatterns, path: &RequestPath) -> bool {
    let bare = path.as_str().trim_end_matches('/');
    patterns.is_denied(path.as_str()) || (!bare.is_empty() && patterns.is_denied(bare))
}

fn serve_file(
    patterns: &AccessPatterns,
    path: RequestPath,
    meta: EntryMeta,
    handle: Box<dyn FileHandle>,
    allow_redirect: bool,
) -> Result<Resolution, ServeError> {
    if redirects_to_directory(patterns, &path, allow_redirect) {
        return Ok(Resolution::Redirect("./".to_string()));
    }
    Ok(Resolution::File {
        path,
        modified: meta.modified,
        content: handle.into_content()?,
    })
}
