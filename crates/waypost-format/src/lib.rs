//! Waypost Format - Cartridge container parsers
//!
//! This crate turns container bytes into a `RawCartridge` without building
//! any objects:
//! - Compiled form: a binary header, an object directory, the script and a media table
//! - Source-archive form: a zip file or directory with one `.lua` script and media files
//! - `LoadConfig`: metadata for the archive form plus the script environment
//!
//! The compiled form can also be written back with `CompiledCartridge::encode`.

pub mod archive;
pub mod compiled;
pub mod config;
pub mod container;
mod error;
mod reader;

pub use archive::ArchiveContents;
pub use compiled::{
    CompiledCartridge, CompiledHeader, DirectoryEntry, MediaBlob, SUPPORTED_VERSIONS,
};
pub use config::{ConfigValue, Environment, LoadConfig};
pub use container::{
    detect, load_bytes, load_path, ContainerForm, MediaKey, MediaTable, RawCartridge,
};
pub use error::{Error, Result};
