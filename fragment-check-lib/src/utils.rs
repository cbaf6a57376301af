//! Utility functions for loading and normalizing handle lists.

use crate::error::FragmentCheckError;
use crate::types::Handle;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Normalize raw lines into handles.
///
/// Blank lines and `#` comments are skipped, a leading `@` is stripped and
/// the order of the input is kept. Duplicates are kept as well: each line is
/// one check.
pub fn parse_handles<I, S>(lines: I) -> Vec<Handle>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let line = line.as_ref().trim();
            if line.starts_with('#') {
                return None;
            }
            let without_comment = line.split('#').next().unwrap_or("");
            Handle::parse(without_comment).ok()
        })
        .collect()
}

/// Read handles from a file, one per line.
///
/// # Arguments
///
/// * `path` - Path to a text file with one handle per line
///
/// # Returns
///
/// The handles in file order, normalized by [`parse_handles`].
///
/// # Errors
///
/// Returns `FragmentCheckError::FileError` if the file cannot be read or
/// holds no handle at all.
pub fn load_handles_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Handle>, FragmentCheckError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| FragmentCheckError::file_error(path.to_string_lossy(), e.to_string()))?;

    let lines = BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FragmentCheckError::file_error(path.to_string_lossy(), e.to_string()))?;

    let handles = parse_handles(lines);
    if handles.is_empty() {
        return Err(FragmentCheckError::file_error(
            path.to_string_lossy(),
            "No handles found in the file",
        ));
    }

    Ok(handles)
}

/// Parse a timeout string like "10s", "30s", "2m" into seconds.
///
/// # Arguments
///
/// * `timeout_str` - Timeout with an optional `s` or `m` suffix; a bare number is read as seconds
///
/// # Returns
///
/// The timeout in seconds, or `None` if the string is not a valid timeout.
///
/// # Example
///
/// ```rust
/// use fragment_check_lib::parse_timeout_string;
///
/// assert_eq!(parse_timeout_string("2m"), Some(120));
/// assert_eq!(parse_timeout_string("15"), Some(15));
/// assert_eq!(parse_timeout_string("soon"), None);
/// ```
pub fn parse_timeout_string(timeout_str: &str) -> Option<u64> {
    let timeout_str = timeout_str.trim().to_lowercase();

    if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| m * 60)
    } else {
        timeout_str.parse::<u64>().ok()
    }
}
