//! Uploaded codebase archives.
//!
//! A codebase arrives as a zip file. It is unpacked into a fresh workspace
//! directory (replacing any previous upload) and named after the archive's
//! base name, which also keys its persisted index.

use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{RagError, Result};

/// Maximum decompressed bytes written for a single entry (zip-bomb protection).
const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Derive a project name from an archive path: the file name up to its first
/// `.`, with anything outside `[A-Za-z0-9_-]` replaced by `_`.
///
/// `my.project.zip` becomes `my`; `web app.zip` becomes `web_app`.
pub fn project_name(archive: &Path) -> Result<String> {
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let base = file_name.split('.').next().unwrap_or_default();
    sanitize_project_name(base)
}

/// Normalize a user-supplied project name the same way [`project_name`] does.
pub fn sanitize_project_name(name: &str) -> Result<String> {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return Err(RagError::InvalidInput(format!(
            "cannot derive a project name from '{}'",
            name
        )));
    }
    Ok(cleaned)
}

/// Extract the zip at `archive` into `dest`, replacing whatever `dest` held.
///
/// Returns the number of regular files written.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize> {
    let file = fs::File::open(archive).map_err(|e| {
        RagError::Archive(format!("cannot open {}: {}", archive.display(), e))
    })?;
    extract_from_reader(file, dest)
}

/// Extract a zip from any seekable reader (an in-memory upload, a file).
///
/// Entries are unpacked into a sibling staging directory that replaces `dest`
/// only once every entry has been written, so a rejected archive leaves the
/// previous upload untouched. Entries whose paths would escape the
/// destination are rejected. An archive with no regular files yields
/// [`RagError::EmptyArchive`].
pub fn extract_from_reader<R: Read + Seek>(reader: R, dest: &Path) -> Result<usize> {
    let mut zip =
        zip::ZipArchive::new(reader).map_err(|e| RagError::Archive(e.to_string()))?;

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            RagError::InvalidInput(format!("invalid extraction path: {}", dest.display()))
        })?;
    fs::create_dir_all(&parent)?;

    let staging = parent.join(format!(".{}.tmp-{}", name, Uuid::new_v4()));
    fs::create_dir(&staging)?;

    let result = unpack_entries(&mut zip, &staging).and_then(|files| {
        if files == 0 {
            return Err(RagError::EmptyArchive);
        }
        if dest.exists() {
            fs::remove_dir_all(dest)?;
        }
        fs::rename(&staging, dest)?;
        Ok(files)
    });
    match result {
        Ok(files) => {
            tracing::info!(files, dest = %dest.display(), "codebase extracted");
            Ok(files)
        }
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            Err(e)
        }
    }
}

fn unpack_entries<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, dest: &Path) -> Result<usize> {
    let mut files = 0usize;
    for i in 0..zip.len() {
        let entry = zip
            .by_index(i)
            .map_err(|e| RagError::Archive(e.to_string()))?;

        let relative = entry.enclosed_name().ok_or_else(|| {
            RagError::Archive(format!("unsafe entry path in archive: {}", entry.name()))
        })?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if !entry.is_file() {
            tracing::debug!(entry = entry.name(), "skipping non-regular archive entry");
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let name = entry.name().to_string();
        let mut out = fs::File::create(&out_path)?;
        let written = std::io::copy(&mut entry.take(MAX_ENTRY_BYTES + 1), &mut out)?;
        if written > MAX_ENTRY_BYTES {
            return Err(RagError::Archive(format!(
                "archive entry {} exceeds size limit ({} bytes)",
                name, MAX_ENTRY_BYTES
            )));
        }
        files += 1;
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    fn zip_bytes(entries: &[(&str, &str)], dirs: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let opts = zip::write::SimpleFileOptions::default();
            for dir in dirs {
                zip.add_directory(*dir, opts).unwrap();
            }
            for (name, body) in entries {
                zip.start_file(*name, opts).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_project_name_from_archive() {
        assert_eq!(project_name(Path::new("/up/shop.zip")).unwrap(), "shop");
        assert_eq!(project_name(Path::new("my.proj.zip")).unwrap(), "my");
        assert_eq!(project_name(Path::new("web app.zip")).unwrap(), "web_app");
        assert!(project_name(Path::new(".zip")).is_err());
    }

    #[test]
    fn test_extracts_nested_files() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("codebase");
        let bytes = zip_bytes(
            &[("src/main.rs", "fn main() {}"), ("README.md", "# hi")],
            &["src/"],
        );
        let n = extract_from_reader(Cursor::new(bytes), &dest).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            fs::read_to_string(dest.join("src/main.rs")).unwrap(),
            "fn main() {}"
        );
    }

    #[test]
    fn test_replaces_previous_upload() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("codebase");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), "old").unwrap();

        let bytes = zip_bytes(&[("new.txt", "new")], &[]);
        extract_from_reader(Cursor::new(bytes), &dest).unwrap();
        assert!(!dest.join("stale.txt").exists());
        assert!(dest.join("new.txt").exists());
    }

    #[test]
    fn test_empty_archive_is_distinct_error() {
        let tmp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[], &["only-a-dir/"]);
        let err = extract_from_reader(Cursor::new(bytes), &tmp.path().join("c")).unwrap_err();
        assert!(matches!(err, RagError::EmptyArchive));
    }

    #[test]
    fn test_garbage_is_archive_error() {
        let tmp = TempDir::new().unwrap();
        let err = extract_from_reader(Cursor::new(b"not a zip".to_vec()), &tmp.path().join("c"))
            .unwrap_err();
        assert!(matches!(err, RagError::Archive(_)));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let tmp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[("../escape.txt", "boom")], &[]);
        let err = extract_from_reader(Cursor::new(bytes), &tmp.path().join("c")).unwrap_err();
        assert!(matches!(err, RagError::Archive(_)));
        assert!(!tmp.path().join("escape.txt").exists());
    }

    fn only_dest_remains(parent: &Path) -> bool {
        fs::read_dir(parent)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .all(|n| n == "c")
    }

    #[test]
    fn test_bad_entry_keeps_previous_upload() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("c");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("previous.rs"), "fn old() {}").unwrap();

        let bytes = zip_bytes(&[("good.rs", "fn good() {}"), ("../escape.txt", "boom")], &[]);
        let err = extract_from_reader(Cursor::new(bytes), &dest).unwrap_err();
        assert!(matches!(err, RagError::Archive(_)));
        assert_eq!(
            fs::read_to_string(dest.join("previous.rs")).unwrap(),
            "fn old() {}"
        );
        assert!(!dest.join("good.rs").exists());
        assert!(only_dest_remains(tmp.path()));
    }

    #[test]
    fn test_empty_archive_keeps_previous_upload() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("c");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("kept.rs"), "fn kept() {}").unwrap();

        let err = extract_from_reader(Cursor::new(zip_bytes(&[], &[])), &dest).unwrap_err();
        assert!(matches!(err, RagError::EmptyArchive));
        assert!(dest.join("kept.rs").is_file());
        assert!(only_dest_remains(tmp.path()));
    }
}
