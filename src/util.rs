//! Shared utility functions used across the codebase.

use std::io::Write;
use std::path::Path;

/// Parse an environment variable as a boolean, returning `default` if unset.
///
/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`;
/// everything else maps to `false`, and an unset variable maps to `default`.
pub fn env_var_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        Err(_) => default,
    }
}

/// Return the value of `$HOME` (`%USERPROFILE%` on Windows), falling back to `/root`.
pub fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| "/root".to_string())
}

/// Write `contents` to `path` via a sibling temp file and a rename.
///
/// With `owner_only` the file is created with mode 0600 on Unix.
pub fn write_atomic(path: &Path, contents: &[u8], owner_only: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if owner_only {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = owner_only;

    let mut file = options.open(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)
}

/// Quote a value for a POSIX shell using single quotes.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_bool_parses_truthy_values() {
        std::env::set_var("CPA_UTIL_TEST_BOOL_ON", " Yes ");
        std::env::set_var("CPA_UTIL_TEST_BOOL_OFF", "nope");
        assert!(env_var_bool("CPA_UTIL_TEST_BOOL_ON", false));
        assert!(!env_var_bool("CPA_UTIL_TEST_BOOL_OFF", true));
        assert!(env_var_bool("CPA_UTIL_TEST_BOOL_UNSET", true));
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("file.json");

        write_atomic(&path, b"first", true).unwrap();
        write_atomic(&path, b"second", true).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
