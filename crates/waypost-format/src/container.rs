//! Container detection and the parsed, not yet constructed cartridge

use crate::archive::{self, ArchiveContents};
use crate::compiled::{self, CompiledCartridge, MediaBlob};
use crate::config::LoadConfig;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use waypost_core::{CartridgeMeta, ValueMap};

/// Which container a cartridge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerForm {
    Compiled { major: u8, minor: u8 },
    Archive,
    Directory,
}

/// Reference to a media entry of the container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaKey {
    /// Object id in a compiled media table
    Index(u16),
    /// Lower-cased file name in a source archive
    File(String),
}

/// Media data of a container
#[derive(Debug, Clone, PartialEq)]
pub enum MediaTable {
    /// Compiled form: blobs indexed by object id
    Indexed(Vec<Option<MediaBlob>>),
    /// Source-archive form: files by lower-cased name
    Named(IndexMap<String, Vec<u8>>),
}

impl MediaTable {
    /// Number of media entries present
    pub fn len(&self) -> usize {
        match self {
            MediaTable::Indexed(blobs) => blobs.iter().flatten().count(),
            MediaTable::Named(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the bytes behind a key
    pub fn get(&self, key: &MediaKey) -> Option<&[u8]> {
        match (self, key) {
            (MediaTable::Indexed(blobs), MediaKey::Index(id)) => blobs
                .get(*id as usize)
                .and_then(|b| b.as_ref())
                .map(|b| b.bytes.as_slice()),
            (MediaTable::Named(files), MediaKey::File(name)) => {
                files.get(&name.to_lowercase()).map(Vec::as_slice)
            }
            _ => None,
        }
    }
}

/// Output of the container parser: everything needed to build a session
#[derive(Debug, Clone, PartialEq)]
pub struct RawCartridge {
    pub form: ContainerForm,
    pub meta: CartridgeMeta,
    /// Opaque script payload
    pub script: Vec<u8>,
    /// Name of the script file, for the archive forms
    pub script_name: Option<String>,
    pub media: MediaTable,
    pub icon: Option<MediaKey>,
    pub splash: Option<MediaKey>,
    /// Environment table for the script host
    pub env: ValueMap,
}

impl RawCartridge {
    fn from_compiled(compiled: CompiledCartridge, source_name: &str, config: &LoadConfig) -> Self {
        let meta = compiled.header.meta();
        let env = config.env.to_value_map(source_name, &meta.device);
        Self {
            form: ContainerForm::Compiled {
                major: compiled.major,
                minor: compiled.minor,
            },
            icon: compiled.icon_id().map(MediaKey::Index),
            splash: compiled.splash_id().map(MediaKey::Index),
            meta,
            script: compiled.script,
            script_name: None,
            media: MediaTable::Indexed(compiled.media),
            env,
        }
    }

    fn from_archive(
        form: ContainerForm,
        contents: ArchiveContents,
        source_name: &str,
        config: &LoadConfig,
    ) -> Self {
        let meta = config.meta();
        let env = config.env.to_value_map(source_name, &meta.device);
        Self {
            form,
            meta,
            script: contents.script,
            script_name: Some(contents.script_name),
            media: MediaTable::Named(contents.files),
            icon: config.icon.clone().map(MediaKey::File),
            splash: config.splash.clone().map(MediaKey::File),
            env,
        }
    }
}

/// Identify the container form of in-memory bytes
pub fn detect(bytes: &[u8]) -> Result<ContainerForm> {
    if compiled::has_signature(bytes) {
        return Ok(ContainerForm::Compiled {
            major: bytes[0],
            minor: bytes[1],
        });
    }
    if archive::has_zip_signature(bytes) {
        return Ok(ContainerForm::Archive);
    }
    Err(Error::UnrecognizedContainer)
}

/// Parse a container held in memory
///
/// `source_name` is the file name the bytes came from; it provides the
/// default `CartFilename` of the environment.
pub fn load_bytes(bytes: &[u8], source_name: &str, config: &LoadConfig) -> Result<RawCartridge> {
    let raw = match detect(bytes)? {
        ContainerForm::Compiled { .. } => {
            RawCartridge::from_compiled(CompiledCartridge::decode(bytes)?, source_name, config)
        }
        form => RawCartridge::from_archive(form, archive::read_zip(bytes)?, source_name, config),
    };
    tracing::info!(
        source = source_name,
        form = ?raw.form,
        name = %raw.meta.name,
        media = raw.media.len(),
        "parsed cartridge container"
    );
    Ok(raw)
}

/// Parse a container file or an unpacked archive directory
pub fn load_path(path: impl AsRef<Path>, config: &LoadConfig) -> Result<RawCartridge> {
    let path = path.as_ref();
    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if path.is_dir() {
        let contents = archive::read_dir(path)?;
        let raw =
            RawCartridge::from_archive(ContainerForm::Directory, contents, &source_name, config);
        tracing::info!(
            source = %path.display(),
            name = %raw.meta.name,
            "parsed cartridge directory"
        );
        return Ok(raw);
    }

    let bytes = fs::read(path)?;
    load_bytes(&bytes, &source_name, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{temp_dir, zip_of};
    use crate::compiled::tests::fixture;
    use waypost_core::Value;

    #[test]
    fn test_detect() {
        let compiled = fixture().encode().unwrap();
        assert_eq!(detect(&compiled).unwrap(), ContainerForm::Compiled { major: 2, minor: 11 });
        assert_eq!(detect(&zip_of(&[("a.lua", "")])).unwrap(), ContainerForm::Archive);
        assert!(matches!(detect(b"hello"), Err(Error::UnrecognizedContainer)));
    }

    #[test]
    fn test_load_compiled() {
        let bytes = fixture().encode().unwrap();
        let raw = load_bytes(&bytes, "harbour.gwc", &LoadConfig::new()).unwrap();

        assert_eq!(raw.meta.name, "Harbour Walk");
        assert_eq!(raw.script, b"-- script payload");
        assert_eq!(raw.splash, Some(MediaKey::Index(1)));
        assert_eq!(raw.icon, None);
        assert_eq!(raw.media.len(), 2);
        assert_eq!(raw.media.get(&MediaKey::Index(3)), Some(&[1u8, 2, 3][..]));
        assert_eq!(raw.env["CartFilename"], Value::from("harbour"));
        assert_eq!(raw.env["Device"], Value::from("PocketPC"));
    }

    #[test]
    fn test_load_archive_uses_config() {
        let bytes = zip_of(&[("Main.lua", "-- code"), ("Logo.png", "png")]);
        let pairs = [("name", "Zipped"), ("icon", "logo.png"), ("device", "Oregon")];
        let config = LoadConfig::from_pairs(pairs).unwrap();
        let raw = load_bytes(&bytes, "zipped.gwz", &config).unwrap();

        assert_eq!(raw.form, ContainerForm::Archive);
        assert_eq!(raw.meta.name, "Zipped");
        assert_eq!(raw.script_name.as_deref(), Some("main.lua"));
        assert_eq!(raw.icon, Some(MediaKey::File("logo.png".to_string())));
        assert_eq!(raw.media.get(&MediaKey::File("LOGO.PNG".to_string())), Some(&b"png"[..]));
        assert_eq!(raw.env["Device"], Value::from("Oregon"));
    }

    #[test]
    fn test_load_path_directory() {
        let dir = temp_dir("container");
        fs::write(dir.join("cart.lua"), b"-- code").unwrap();
        let raw = load_path(&dir, &LoadConfig::new()).unwrap();
        assert_eq!(raw.form, ContainerForm::Directory);
        assert!(raw.media.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_path_file() {
        let dir = temp_dir("container-file");
        let file = dir.join("walk.gwc");
        fs::write(&file, fixture().encode().unwrap()).unwrap();
        let raw = load_path(&file, &LoadConfig::new()).unwrap();
        assert_eq!(raw.env["CartFilename"], Value::from("walk"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_truncated_container_fails() {
        let bytes = fixture().encode().unwrap();
        let result = load_bytes(&bytes[..bytes.len() - 2], "cut.gwc", &LoadConfig::new());
        assert!(matches!(result, Err(Error::Truncated { .. })));
    }
}
