//! Source file discovery.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A discovered source file.
#[derive(Clone, Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    /// File stem without extension, e.g. `player` for `player.object`.
    pub name: String,
    pub modified: SystemTime,
}

impl FileInfo {
    /// Seconds since the unix epoch of the last modification.
    ///
    /// Feeds cache keys, so it must not depend on local timezone state.
    pub fn modified_secs(&self) -> u64 {
        self.modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Collects every file under `dir` with the given extension (no leading
/// dot), optionally recursing into subdirectories.
///
/// The result is sorted by path. Directory iteration order is
/// platform-defined, and cache keys and generated tables must not change
/// between identical builds.
pub fn directory_iterate(
    dir: &Path,
    extension: &str,
    recurse: bool,
) -> std::io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();
    let mut queue = vec![dir.to_path_buf()];

    while let Some(dir) = queue.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let meta = entry.metadata()?;

            if meta.is_dir() {
                if recurse {
                    queue.push(path);
                }
                continue;
            }

            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_owned();

            files.push(FileInfo {
                path,
                name,
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("gathered {} .{} files from {}", files.len(), extension, dir.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::directory_iterate;

    #[test]
    fn finds_files_by_extension() {
        let dir = std::env::temp_dir().join("ember_fs_test");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("a.texture"), "{}").unwrap();
        std::fs::write(dir.join("b.object"), "").unwrap();
        std::fs::write(dir.join("sub/c.texture"), "{}").unwrap();

        let flat = directory_iterate(&dir, "texture", false).unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].name, "a");

        let deep = directory_iterate(&dir, "texture", true).unwrap();
        assert_eq!(deep.len(), 2);
        // Sorted by full path, so the result is stable across runs.
        assert!(deep[0].path < deep[1].path);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(directory_iterate(Path::new("/nonexistent/ember"), "texture", true).is_err());
    }
}
