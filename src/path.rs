//! Path helpers for document and collection addresses.
//!
//! Addresses are hierarchical, slash-separated strings that alternate
//! collection and document segments below a root:
//! `/projects/demo/humans/ann/pets/rex`.
//!
//! Everything here is pure. Resolution against the configured root lives on
//! [`Configuration`](crate::config::Configuration).

use crate::error::{RecordError, Result};

/// Maximum path length in bytes.
pub const MAX_PATH_LENGTH: usize = 1024;

/// Path separator.
pub const SEPARATOR: char = '/';

/// Validate that an absolute path is well-formed.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(RecordError::InvalidPath("path cannot be empty".to_string()));
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(RecordError::InvalidPath(format!(
            "path exceeds maximum length of {} bytes",
            MAX_PATH_LENGTH
        )));
    }
    if !path.starts_with(SEPARATOR) {
        return Err(RecordError::InvalidPath(format!(
            "path must start with '/': {}",
            path
        )));
    }
    if path[1..].split(SEPARATOR).any(str::is_empty) {
        return Err(RecordError::InvalidPath(format!(
            "path contains an empty segment: {}",
            path
        )));
    }
    Ok(())
}

/// Validate a single collection name or document id.
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(RecordError::InvalidIdentity(
            "segment cannot be empty".to_string(),
        ));
    }
    if segment.contains(SEPARATOR) {
        return Err(RecordError::InvalidIdentity(format!(
            "segment cannot contain '/': {}",
            segment
        )));
    }
    Ok(())
}

/// Append one segment to a base address. An empty base is the root.
pub fn join(base: &str, segment: &str) -> String {
    format!("{}{}{}", base.trim_end_matches(SEPARATOR), SEPARATOR, segment)
}

/// Normalize a configured root prefix to `/a/b` form.
///
/// Leading and trailing separators are optional on input. An empty prefix
/// (or a bare `/`) normalizes to the empty string, i.e. the store root.
pub fn normalize_prefix(prefix: &str) -> Result<String> {
    let trimmed = prefix.trim_matches(SEPARATOR);
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let normalized = format!("{}{}", SEPARATOR, trimmed);
    validate_path(&normalized)?;
    Ok(normalized)
}

/// Last segment of a path (the document id for a document path).
pub fn last_segment(path: &str) -> Option<&str> {
    path.rsplit(SEPARATOR).next().filter(|s| !s.is_empty())
}

/// Everything before the last segment. Returns `None` for paths without a
/// separator.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once(SEPARATOR).map(|(head, _)| head)
}

/// Address of a sub-collection hanging off a document.
pub fn resolve_sub_collection_address(
    parent_document_address: &str,
    sub_collection_name: &str,
) -> Result<String> {
    validate_path(parent_document_address)?;
    validate_segment(sub_collection_name)?;
    Ok(join(parent_document_address, sub_collection_name))
}
