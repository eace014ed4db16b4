//! Multipart upload handling with collision-avoiding renames.
//!
//! The whole form is drained before any file touches disk, matching the
//! parse-then-iterate semantics of the upload contract: a malformed part
//! fails the request before the first write. Once writing starts, the first
//! per-file failure aborts the request; files saved earlier in the same
//! request stay on disk and are not rolled back.

use crate::config::ServerConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::resolve::apply_tag;
use bytes::Bytes;
use futures::Stream;
use multer::{Constraints, Multipart, SizeLimit};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Form field carrying file parts.
const FILE_FIELD: &str = "file";

/// Form field carrying the anonymous pass values, one per file part.
const PASS_FIELD: &str = "pass";

/// Receive a multipart upload into `dest_dir`.
///
/// Each file part is stored under the first non-colliding name derived from
/// its intended one. In anonymous mode (`tag_uploads` on the config's
/// access mode) the positional `pass` value is appended as a name tag after
/// the collision probe. Returns the number of files saved.
pub async fn receive<S, E>(
    config: &ServerConfig,
    dest_dir: &Path,
    stream: S,
    boundary: String,
) -> DispatchResult<usize>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let constraints = Constraints::new()
        .size_limit(SizeLimit::new().whole_stream(config.max_upload_bytes));
    let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

    let mut files: Vec<(String, Bytes)> = Vec::new();
    let mut passes: Vec<String> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(DispatchError::Multipart)?
    {
        // field.bytes() consumes the field, so copy the name out first.
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some(FILE_FIELD) => {
                let filename = sanitize_filename(field.file_name());
                let data = field.bytes().await.map_err(DispatchError::UploadRead)?;
                files.push((filename, data));
            }
            Some(PASS_FIELD) => {
                let value = field.text().await.map_err(DispatchError::UploadRead)?;
                passes.push(value);
            }
            _ => {
                // Unknown fields are drained and dropped.
                field.bytes().await.map_err(DispatchError::UploadRead)?;
            }
        }
    }

    let tag_uploads = !config.mode.auth_enabled();
    let mut saved = 0;

    for (index, (filename, data)) in files.iter().enumerate() {
        let free = free_name(dest_dir, filename).await;
        let target = if tag_uploads {
            let pass = passes
                .get(index)
                .ok_or(DispatchError::UploadPass(index))?;
            apply_tag(&free, pass)
        } else {
            free
        };

        tokio::fs::write(&target, data)
            .await
            .map_err(|e| DispatchError::UploadSave {
                path: target.clone(),
                source: e,
            })?;
        info!(path = %target.display(), bytes = data.len(), "upload saved");
        saved += 1;
    }

    Ok(saved)
}

/// Reduce a client-supplied filename to its final component.
fn sanitize_filename(name: Option<&str>) -> String {
    name.and_then(|n| Path::new(n).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

/// First non-colliding destination for `name` in `dir`: the name itself,
/// then `stem-1.ext`, `stem-2.ext`, ... The probe is unbounded; two racing
/// uploads can both observe a name as free, in which case either writer
/// wins. The probe always checks the untagged name; anonymous tags are
/// applied afterwards.
async fn free_name(dir: &Path, name: &str) -> PathBuf {
    let mut path = dir.join(name);
    let (stem, ext) = split_name(name);
    let mut attempt: u64 = 1;
    while tokio::fs::metadata(&path).await.is_ok() {
        path = dir.join(format!("{stem}-{attempt}{ext}"));
        attempt += 1;
    }
    debug!(path = %path.display(), "chose upload destination");
    path
}

/// Split a name into (stem, `.ext`); the extension starts at the final dot.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}
