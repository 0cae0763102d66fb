//! Path utilities for container detection and output naming.

use std::path::Path;

/// Container extensions the remuxer accepts as input.
const CONTAINER_EXTENSIONS: &[&str] = &["mkv", "mp4", "ts", "m2ts", "vob"];

/// Check if a path has a remuxable container extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use discmux_common::paths::is_container_file;
///
/// assert!(is_container_file(Path::new("movie.MKV")));
/// assert!(is_container_file(Path::new("/disc/BDMV/STREAM/00001.m2ts")));
/// assert!(!is_container_file(Path::new("cover.jpg")));
/// ```
pub fn is_container_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| CONTAINER_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Replace characters that cannot appear in a single path component.
///
/// # Examples
///
/// ```
/// use discmux_common::paths::safe_filename;
///
/// assert_eq!(safe_filename("Movie: Part 1/2"), "Movie_ Part 1_2");
/// ```
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// File stem as an owned string, empty when the path has none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename_keeps_ordinary_names() {
        assert_eq!(safe_filename("BD_VIDEO"), "BD_VIDEO");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/a/00800.mpls")), "00800");
        assert_eq!(file_stem(Path::new("/")), "");
    }
}
