//! Directory listing rendered into the HTML template.
//!
//! A listing is an ordered sequence of [`DirEntry`] records: a synthetic
//! root entry, a synthetic parent entry, then one record per child in
//! whatever order the filesystem enumerates them; no sort is imposed and
//! callers must not assume one. The records are serialized to JSON and
//! substituted into the operator-provided `template.html`.

use crate::error::{DispatchError, DispatchResult};
use crate::resolve::strip_tag;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Placeholder token the listing template carries twice.
const FILES_TOKEN: &str = "${files}";

/// Sentinel extension for directory entries.
const DIRECTORY_EXT: &str = "Directory";

/// Timestamp format exposed in listings.
const DATE_FORMAT: &str = "%Y/%m/%d-%H:%M:%S";

/// One listing record, serialized into the page payload.
#[derive(Debug, Clone, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub extension: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    pub date: String,
    pub size: i64,
}

impl DirEntry {
    /// Synthetic navigation entry (`/` or `../`).
    fn synthetic(name: &str) -> Self {
        DirEntry {
            name: name.to_string(),
            path: name.to_string(),
            extension: DIRECTORY_EXT.to_string(),
            is_dir: true,
            date: String::new(),
            size: 0,
        }
    }
}

/// Enumerate a confirmed directory into listing records.
///
/// With `untag` set (anonymous mode), on-disk names have their `__<pass>`
/// tag stripped before being exposed; the raw tagged name never appears in
/// a listing. Children whose metadata cannot be read are skipped.
pub async fn list_directory(
    dir: &Path,
    url_path: &str,
    untag: bool,
) -> DispatchResult<Vec<DirEntry>> {
    let mut reader = tokio::fs::read_dir(dir).await.map_err(|e| {
        warn!(path = %dir.display(), error = %e, "failed to read directory");
        DispatchError::NotFound(dir.to_path_buf())
    })?;

    let mut entries = vec![DirEntry::synthetic("/"), DirEntry::synthetic("../")];

    while let Some(child) = reader.next_entry().await.map_err(|e| {
        warn!(path = %dir.display(), error = %e, "failed to enumerate directory");
        DispatchError::NotFound(dir.to_path_buf())
    })? {
        let raw_name = child.file_name().to_string_lossy().into_owned();
        let meta = match child.metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(name = %raw_name, error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let exposed = if untag {
            strip_tag(&raw_name).to_string()
        } else {
            raw_name
        };

        let mut record = DirEntry {
            path: join_url_path(url_path, &exposed),
            extension: extension_of(&exposed),
            is_dir: meta.is_dir(),
            date: format_mtime(&meta),
            size: meta.len() as i64,
            name: exposed,
        };
        if meta.is_dir() {
            record.name.push('/');
            record.extension = DIRECTORY_EXT.to_string();
        }
        entries.push(record);
    }

    Ok(entries)
}

/// Substitute the listing payload into the template.
///
/// The template contains the `${files}` token twice: the first occurrence
/// receives the JSON payload, the second is then overwritten with
/// `"disable"` when authentication is enabled or blanked otherwise. Both
/// passes run every time; pages are built around that contract.
pub fn render(template: &str, entries: &[DirEntry], auth_enabled: bool) -> String {
    let payload = serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string());
    let page = template.replacen(FILES_TOKEN, &payload, 1);
    let second = if auth_enabled { "disable" } else { "" };
    page.replacen(FILES_TOKEN, second, 1)
}

/// Suffix of `name` starting at its final dot, empty when there is none.
fn extension_of(name: &str) -> String {
    name.rfind('.')
        .map(|idx| name[idx..].to_string())
        .unwrap_or_default()
}

/// URL-style join of the request path and a child name.
fn join_url_path(base: &str, name: &str) -> String {
    if base.is_empty() || base == "/" {
        format!("/{name}")
    } else {
        format!("{}/{}", base.trim_end_matches('/'), name)
    }
}

fn format_mtime(meta: &std::fs::Metadata) -> String {
    meta.modified()
        .map(|t| DateTime::<Local>::from(t).format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}
