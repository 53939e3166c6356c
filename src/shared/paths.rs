use std::path::{Path, PathBuf};

const APP_DIR: &str = "winlapse";

/// Get the base storage directory following XDG Base Directory Specification.
/// Returns `$XDG_DATA_HOME/winlapse` or `~/.local/share/winlapse`, falling back
/// to the platform data dir when `HOME` is not set.
pub fn get_storage_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Returns `{storage_dir}/logs`.
pub fn get_log_dir() -> PathBuf {
    get_storage_dir().join("logs")
}

/// Resolves a configured directory: absolute paths are kept, relative ones
/// are taken from the current working directory.
pub fn resolve_dir(configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        return configured.to_path_buf();
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(configured))
        .unwrap_or_else(|_| configured.to_path_buf())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_dir_structure() {
        let storage = get_storage_dir();
        assert!(storage.ends_with("winlapse"));

        let logs = get_log_dir();
        assert!(logs.ends_with("logs"));
        assert!(logs.starts_with(&storage));
    }

    #[test]
    fn test_absolute_dir_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_dir(dir.path()), dir.path().to_path_buf());
        assert!(resolve_dir(Path::new("recordings")).ends_with("recordings"));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }
}
