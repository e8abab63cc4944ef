use std::path::{Path, PathBuf};

/// Validate that a path exists and is a readable file.
///
/// Returns `None` for paths that do not exist or are not regular files.
/// Callers treat a `None` as "skip this path and record a non-fatal error".
pub fn validate_read_path(path: &Path) -> Option<PathBuf> {
    if path.is_file() { Some(path.to_path_buf()) } else { None }
}

/// Validate that `dir` exists (or can be created) and join a sanitized
/// file name onto it. Returns `None` when the directory cannot be prepared.
pub fn validate_write_path(dir: &Path, name: &str) -> Option<PathBuf> {
    if !dir.exists() && std::fs::create_dir_all(dir).is_err() {
        return None;
    }
    Some(dir.join(sanitize_file_name(name)))
}

/// Replace path separators and other unsafe characters in a file name.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// True if the string contains at least one `${...}` interpolation marker.
pub fn has_interpolation(content: &str) -> bool {
    content.contains("${")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.json"), "report.json");
        assert_eq!(sanitize_file_name("a/b\\c:d"), "a_b_c_d");
    }

    #[test]
    fn test_validate_read_path_missing() {
        assert!(validate_read_path(Path::new("/nonexistent/file.ts")).is_none());
    }

    #[test]
    fn test_has_interpolation() {
        assert!(has_interpolation("query { ${foo} }"));
        assert!(!has_interpolation("query { id }"));
    }
}
