//! Source-archive form: a zip file or an unpacked directory
//!
//! The archive holds exactly one top-level `.lua` script and any number of
//! media files. Names are lower-cased before matching; entries in
//! subdirectories are ignored.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

/// Zip local file header
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
/// Zip end of central directory, the first record of an empty archive
const ZIP_EMPTY_MAGIC: &[u8; 4] = b"PK\x05\x06";

/// Check for a zip signature
pub fn has_zip_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(ZIP_EMPTY_MAGIC)
}

/// Files of a source archive
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArchiveContents {
    /// Lower-cased name of the script entry
    pub script_name: String,
    pub script: Vec<u8>,
    /// Remaining top-level files by lower-cased name, in archive order
    pub files: IndexMap<String, Vec<u8>>,
}

/// Read a zip archive held in memory
pub fn read_zip(bytes: &[u8]) -> Result<ArchiveContents> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        if name.contains('/') || name.contains('\\') {
            tracing::debug!(entry = %name, "ignoring nested archive entry");
            continue;
        }
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        entries.push((name, data));
    }
    collect(entries)
}

/// Read an unpacked archive directory
pub fn read_dir(path: &Path) -> Result<ArchiveContents> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            tracing::debug!(entry = %entry.path().display(), "ignoring nested directory");
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let data = fs::read(entry.path())?;
        entries.push((name, data));
    }
    // Directory listing order is platform dependent
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    collect(entries)
}

fn collect(entries: Vec<(String, Vec<u8>)>) -> Result<ArchiveContents> {
    let mut files: IndexMap<String, Vec<u8>> = IndexMap::new();
    let mut script_name: Option<String> = None;

    for (name, data) in entries {
        let lower = name.to_lowercase();
        if files.contains_key(&lower) {
            return Err(Error::DuplicateEntry(lower));
        }
        if Path::new(&lower).extension().is_some_and(|ext| ext == "lua") {
            if let Some(first) = &script_name {
                return Err(Error::MultipleScripts {
                    first: first.clone(),
                    second: lower,
                });
            }
            script_name = Some(lower.clone());
        }
        files.insert(lower, data);
    }

    let script_name = script_name.ok_or(Error::MissingScript)?;
    let script = files.shift_remove(&script_name).unwrap_or_default();
    tracing::debug!(script = %script_name, media_files = files.len(), "read source archive");
    Ok(ArchiveContents {
        script_name,
        script,
        files,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zip::write::SimpleFileOptions;

    pub(crate) fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    pub(crate) fn temp_dir(tag: &str) -> std::path::PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let name = format!("waypost-{}-{}-{}", tag, std::process::id(), n);
        let dir = std::env::temp_dir().join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_read_zip() {
        let bytes = zip_of(&[
            ("Main.LUA", "-- code"),
            ("Logo.PNG", "png"),
            ("sub/", ""),
            ("sub/extra.png", "nested"),
        ]);
        assert!(has_zip_signature(&bytes));

        let contents = read_zip(&bytes).unwrap();
        assert_eq!(contents.script_name, "main.lua");
        assert_eq!(contents.script, b"-- code");
        assert_eq!(contents.files.len(), 1);
        assert_eq!(contents.files["logo.png"], b"png");
    }

    #[test]
    fn test_missing_script() {
        let bytes = zip_of(&[("logo.png", "png")]);
        assert!(matches!(read_zip(&bytes), Err(Error::MissingScript)));
    }

    #[test]
    fn test_multiple_scripts() {
        let bytes = zip_of(&[("a.lua", "1"), ("b.lua", "2")]);
        assert!(matches!(read_zip(&bytes), Err(Error::MultipleScripts { .. })));
    }

    #[test]
    fn test_duplicate_after_lowercasing() {
        let bytes = zip_of(&[("main.lua", "1"), ("Logo.png", "a"), ("LOGO.png", "b")]);
        match read_zip(&bytes) {
            Err(Error::DuplicateEntry(name)) => assert_eq!(name, "logo.png"),
            other => panic!("expected duplicate entry, got {:?}", other),
        }
    }

    #[test]
    fn test_read_dir() {
        let dir = temp_dir("archive");
        fs::write(dir.join("Game.lua"), b"-- code").unwrap();
        fs::write(dir.join("sound.MP3"), b"mp3").unwrap();
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("x.png"), b"x").unwrap();

        let contents = read_dir(&dir).unwrap();
        assert_eq!(contents.script_name, "game.lua");
        assert_eq!(contents.files.keys().collect::<Vec<_>>(), vec!["sound.mp3"]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
