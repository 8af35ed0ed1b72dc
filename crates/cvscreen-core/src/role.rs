//! Job role derivation from the input folder name.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref ROLE_SEPARATORS: Regex = Regex::new(r"[_-]").unwrap();
}

/// Turn a folder name like `junior_fullstack-developer` into `junior fullstack developer`.
pub fn role_from_name(name: &str) -> String {
    ROLE_SEPARATORS.replace_all(name, " ").trim().to_string()
}

/// Role for a folder path, taken from its last component.
///
/// Paths without a final component (`/`, `..`) yield an empty role; callers
/// that accept relative paths should canonicalize first.
pub fn role_from_folder(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| role_from_name(&name.to_string_lossy()))
        .unwrap_or_default()
}
