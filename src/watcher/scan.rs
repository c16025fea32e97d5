//! Directory listing for candidate files.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::WatchError;

/// A file in a watch directory that matches the source's suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Case-insensitive suffix match (`a.XML` matches `xml`).
pub fn matches_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

/// List matching regular files, oldest modification first.
///
/// Entries that disappear while being listed are skipped. Equal timestamps
/// are ordered by path so the order is deterministic.
pub async fn list_candidates(dir: &Path, extension: &str) -> Result<Vec<Candidate>, WatchError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WatchError::DirectoryMissing {
                path: dir.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(WatchError::ListFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let mut candidates = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                return Err(WatchError::ListFailed {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let path = entry.path();
        if !matches_extension(&path, extension) {
            continue;
        }

        // Follows symlinks, unlike DirEntry::metadata
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                crate::debug_event!("scan", "skipped", "{}: {e}", path.display());
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        candidates.push(Candidate {
            path,
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    candidates.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use std::fs;
    use tempfile::TempDir;

    fn write_with_mtime(dir: &Path, name: &str, unix_secs: i64) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "<R/>").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(unix_secs, 0)).unwrap();
        path
    }

    #[test]
    fn test_matches_extension() {
        assert!(matches_extension(Path::new("/in/a.xml"), "xml"));
        assert!(matches_extension(Path::new("/in/a.XML"), "xml"));
        assert!(matches_extension(Path::new("/in/a.Xml"), ".xml"));
        assert!(!matches_extension(Path::new("/in/a.xml.tmp"), "xml"));
        assert!(!matches_extension(Path::new("/in/xml"), "xml"));
        assert!(!matches_extension(Path::new("/in/a.txt"), "xml"));
    }

    #[tokio::test]
    async fn test_lists_oldest_first() {
        let temp = TempDir::new().unwrap();
        let newest = write_with_mtime(temp.path(), "a.xml", 1_700_000_300);
        let oldest = write_with_mtime(temp.path(), "b.XML", 1_700_000_100);
        let middle = write_with_mtime(temp.path(), "c.xml", 1_700_000_200);
        write_with_mtime(temp.path(), "notes.txt", 1_600_000_000);
        fs::create_dir(temp.path().join("archive.xml")).unwrap();

        let listed: Vec<PathBuf> = list_candidates(temp.path(), "xml")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.path)
            .collect();

        assert_eq!(listed, vec![oldest, middle, newest]);
    }

    #[tokio::test]
    async fn test_equal_mtimes_sorted_by_name() {
        let temp = TempDir::new().unwrap();
        let b = write_with_mtime(temp.path(), "b.xml", 1_700_000_000);
        let a = write_with_mtime(temp.path(), "a.xml", 1_700_000_000);

        let listed: Vec<PathBuf> = list_candidates(temp.path(), "xml")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.path)
            .collect();

        assert_eq!(listed, vec![a, b]);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let temp = TempDir::new().unwrap();
        let err = list_candidates(&temp.path().join("gone"), "xml")
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::DirectoryMissing { .. }));
    }
}
