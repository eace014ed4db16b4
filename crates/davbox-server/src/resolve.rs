//! Path resolution and the anonymous filename-tag convention.
//!
//! URL paths are reduced to their normal components before joining, so a
//! request can never climb out of its root scope. The `__<pass>` tag that
//! `Open` mode stores in on-disk filenames is applied and stripped only
//! here; callers everywhere else see plain names. Keeping the convention
//! behind this module means it could be replaced by a real per-file ACL
//! store without touching the router, lister, or upload receiver.
//!
//! The tag is a known weakness: the secret is visible to anything that can
//! list the raw directory outside this server.

use crate::error::{DispatchError, DispatchResult};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};

/// Delimiter between an on-disk name and its anonymous password tag.
pub const TAG_DELIMITER: &str = "__";

/// Decode the percent-encoding of a raw request path, once.
///
/// Clients must encode spaces, non-ASCII and reserved characters on the
/// wire; on-disk names are the decoded form. Invalid UTF-8 sequences
/// decode lossily and simply miss at the filesystem lookup. Callers clean
/// the decoded result afterwards, so an encoded dot segment cannot climb
/// either.
pub fn decode_url_path(url_path: &str) -> String {
    percent_decode_str(url_path).decode_utf8_lossy().into_owned()
}

/// Reduce a raw URL path to its normal components.
///
/// Root prefixes, `.` and `..` are dropped rather than resolved, so the
/// result can only descend from whatever it is joined onto.
pub fn clean_request_path(url_path: &str) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in Path::new(url_path).components() {
        if let Component::Normal(part) = component {
            clean.push(part);
        }
    }
    clean
}

/// Candidate filesystem path for a request: `join(root, identity, urlPath)`.
///
/// Pure path arithmetic; the filesystem is not consulted.
pub fn candidate(root: &Path, identity: &str, url_path: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    if !identity.is_empty() {
        path.push(identity);
    }
    path.push(clean_request_path(url_path));
    path
}

/// Append the anonymous tag to the final path component.
pub fn apply_tag(path: &Path, pass: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TAG_DELIMITER);
    name.push(pass);
    path.with_file_name(name)
}

/// Strip the anonymous tag from an on-disk name: split on the *last*
/// delimiter and drop the trailing segment. A name with no delimiter is
/// exposed unchanged.
pub fn strip_tag(name: &str) -> &str {
    name.rsplit_once(TAG_DELIMITER)
        .map_or(name, |(stem, _)| stem)
}

/// `Open`-mode fallback for a candidate that does not exist on disk:
/// require exactly one `pass` query value and retry with the tagged name.
/// A missing or multi-valued `pass` is a resolution failure.
pub fn tagged_candidate(candidate: &Path, query: Option<&str>) -> DispatchResult<PathBuf> {
    let query = query.unwrap_or_default();
    let mut passes = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "pass")
        .map(|(_, value)| value.into_owned());

    let pass = passes.next().ok_or(DispatchError::PassParameter)?;
    if passes.next().is_some() {
        return Err(DispatchError::PassParameter);
    }
    Ok(apply_tag(candidate, &pass))
}
