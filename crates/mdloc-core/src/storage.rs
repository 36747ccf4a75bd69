//! Asset directory I/O: reuse lookup and write-then-rename persistence.
//!
//! Assets are written to a uniquely named `.part` file next to the final
//! path and renamed into place, so a partially written asset is never visible
//! under its content-addressed name. Blocking; call from `spawn_blocking`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Temporary file suffix used before rename.
pub const TEMP_SUFFIX: &str = ".part";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temp path for `final_path`, unique per process and call
/// (e.g. `abc.webp` → `abc.webp.1234-7.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut o = final_path.as_os_str().to_owned();
    o.push(format!(".{}-{}{}", std::process::id(), n, TEMP_SUFFIX));
    PathBuf::from(o)
}

/// Finds a persisted asset named `<stem>.<ext>` in `dir`, ignoring temp files.
/// A missing directory is not an error.
pub fn find_existing(dir: &Path, stem: &str) -> io::Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut found: Option<PathBuf> = None;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.ends_with(TEMP_SUFFIX) || !entry.file_type()?.is_file() {
            continue;
        }
        let Some((head, ext)) = name.split_once('.') else {
            continue;
        };
        if head != stem || ext.is_empty() || ext.contains('.') {
            continue;
        }
        let path = entry.path();
        if found.as_ref().map_or(true, |f| path < *f) {
            found = Some(path);
        }
    }
    Ok(found)
}

/// Writes `bytes` to `final_path` unless a file already exists there.
/// Returns `true` if this call wrote the file.
pub fn persist_if_absent(final_path: &Path, bytes: &[u8]) -> io::Result<bool> {
    if final_path.exists() {
        return Ok(false);
    }
    let tmp = temp_path(final_path);
    let written = write_and_sync(&tmp, bytes).and_then(|()| fs::rename(&tmp, final_path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(true)
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_paths_are_unique_and_marked() {
        let a = temp_path(Path::new("/tmp/x.webp"));
        let b = temp_path(Path::new("/tmp/x.webp"));
        assert_ne!(a, b);
        assert!(a.to_string_lossy().starts_with("/tmp/x.webp."));
        assert!(a.to_string_lossy().ends_with(".part"));
    }

    #[test]
    fn persist_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.png");
        assert!(persist_if_absent(&path, b"first").unwrap());
        assert!(!persist_if_absent(&path, b"second").unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"first");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(TEMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn persist_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("abc.png");
        assert!(persist_if_absent(&path, b"x").is_err());
    }

    #[test]
    fn find_existing_matches_any_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_existing(dir.path(), "abc").unwrap(), None);
        fs::write(dir.path().join("abc.webp"), b"x").unwrap();
        fs::write(dir.path().join("abcd.png"), b"x").unwrap();
        assert_eq!(
            find_existing(dir.path(), "abc").unwrap(),
            Some(dir.path().join("abc.webp"))
        );
    }

    #[test]
    fn find_existing_ignores_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc.webp.99-0.part"), b"x").unwrap();
        assert_eq!(find_existing(dir.path(), "abc").unwrap(), None);
    }

    #[test]
    fn find_existing_in_missing_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_existing(&dir.path().join("missing"), "abc").unwrap(), None);
    }
}
