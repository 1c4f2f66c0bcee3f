//! Compiled cartridge format
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! u8 major, u8 minor, "CART\0"
//! u16 object count
//! count x (u16 object id, u32 offset)
//! u32 header length
//! header fields (see `CompiledHeader`)
//! at offset of object 0: u32 length, script bytes
//! at offset of object i: u8 present [, i32 type code, u32 length, bytes]
//! ```

use crate::error::{Error, Result};
use crate::reader::Reader;
use chrono::{DateTime, Utc};
use waypost_core::{CartridgeMeta, MediaType, ZonePoint};

const TAG: &[u8; 5] = b"CART\0";
const SIGNATURE_LEN: usize = 7;

/// Format versions this crate reads and writes
pub const SUPPORTED_VERSIONS: [(u8, u8); 2] = [(2, 10), (2, 11)];

/// Unix time of 2004-02-10T01:00:00Z, the origin of the `created` field
const CREATED_EPOCH_UNIX: i64 = 1_076_374_800;

/// Check for the compiled signature, ignoring the version bytes
pub fn has_signature(bytes: &[u8]) -> bool {
    bytes.len() >= SIGNATURE_LEN && &bytes[2..SIGNATURE_LEN] == TAG
}

/// One media file of a compiled cartridge
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub kind: MediaType,
    pub bytes: Vec<u8>,
}

/// Metadata block of a compiled cartridge, in file order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledHeader {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Seconds since 2004-02-10T01:00:00Z
    pub created: u64,
    /// Media object shown on the start screen; 0 or less means none
    pub splash_id: i16,
    /// Media object used as icon; 0 or less means none
    pub icon_id: i16,
    pub gametype: String,
    pub user: String,
    pub player_id: u64,
    pub name: String,
    pub guid: String,
    pub description: String,
    pub starting_description: String,
    pub version: String,
    pub author: String,
    pub url: String,
    pub device: String,
    pub reserved: u32,
    pub completion_code: String,
}

impl CompiledHeader {
    fn read(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            latitude: r.f64()?,
            longitude: r.f64()?,
            altitude: r.f64()?,
            created: r.u64()?,
            splash_id: r.i16()?,
            icon_id: r.i16()?,
            gametype: r.cstring()?,
            user: r.cstring()?,
            player_id: r.u64()?,
            name: r.cstring()?,
            guid: r.cstring()?,
            description: r.cstring()?,
            starting_description: r.cstring()?,
            version: r.cstring()?,
            author: r.cstring()?,
            url: r.cstring()?,
            device: r.cstring()?,
            reserved: r.u32()?,
            completion_code: r.cstring()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.latitude.to_le_bytes());
        out.extend_from_slice(&self.longitude.to_le_bytes());
        out.extend_from_slice(&self.altitude.to_le_bytes());
        out.extend_from_slice(&self.created.to_le_bytes());
        out.extend_from_slice(&self.splash_id.to_le_bytes());
        out.extend_from_slice(&self.icon_id.to_le_bytes());
        put_str(out, "gametype", &self.gametype)?;
        put_str(out, "user", &self.user)?;
        out.extend_from_slice(&self.player_id.to_le_bytes());
        put_str(out, "name", &self.name)?;
        put_str(out, "guid", &self.guid)?;
        put_str(out, "description", &self.description)?;
        put_str(out, "startdesc", &self.starting_description)?;
        put_str(out, "version", &self.version)?;
        put_str(out, "author", &self.author)?;
        put_str(out, "url", &self.url)?;
        put_str(out, "device", &self.device)?;
        out.extend_from_slice(&self.reserved.to_le_bytes());
        put_str(out, "completion_code", &self.completion_code)?;
        Ok(())
    }

    /// Creation time, when representable
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let offset = i64::try_from(self.created).ok()?;
        DateTime::from_timestamp(CREATED_EPOCH_UNIX.checked_add(offset)?, 0)
    }

    /// Cartridge metadata described by this header
    pub fn meta(&self) -> CartridgeMeta {
        CartridgeMeta {
            activity: self.gametype.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            guid: self.guid.clone(),
            name: self.name.clone(),
            starting_location: ZonePoint::new(self.latitude, self.longitude, self.altitude),
            starting_description: self.starting_description.clone(),
            url: self.url.clone(),
            device: self.device.clone(),
            version: self.version.clone(),
            user: self.user.clone(),
            completion_code: self.completion_code.clone(),
            created: self.created_at(),
        }
    }
}

fn put_str(out: &mut Vec<u8>, field: &'static str, value: &str) -> Result<()> {
    if value.as_bytes().contains(&0) {
        return Err(Error::NulInField(field));
    }
    out.extend_from_slice(value.as_bytes());
    out.push(0);
    Ok(())
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::TooManyObjects(len))
}

/// Directory entry: where an object's data starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: u16,
    pub offset: u32,
}

/// Check every entry names an object slot and no slot is claimed twice
///
/// Slot 0 belongs to the script whatever id the first entry carries.
fn check_directory(directory: &[DirectoryEntry], count: u16) -> Result<()> {
    let mut claimed = vec![false; count as usize];
    claimed[0] = true;
    for (index, entry) in directory.iter().enumerate() {
        if entry.id >= count {
            return Err(Error::ObjectIdOutOfRange { id: entry.id, count });
        }
        if index == 0 {
            continue;
        }
        let slot = &mut claimed[entry.id as usize];
        if *slot {
            return Err(Error::DuplicateObjectId { id: entry.id });
        }
        *slot = true;
    }
    Ok(())
}

/// Byte layout of a decoded file
///
/// Lets `encode` put every body back where it was found, along with the
/// padding and trailing bytes no object claims.
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    prefix_len: usize,
    /// (offset, length) of each body, in directory order
    spans: Vec<(u32, usize)>,
    /// Unclaimed bytes after the header, keyed by offset
    gaps: Vec<(usize, Vec<u8>)>,
    total_len: usize,
}

impl Layout {
    fn capture(bytes: &[u8], header_end: usize, spans: Vec<(u32, usize)>) -> Self {
        let mut covered: Vec<(usize, usize)> = spans
            .iter()
            .map(|&(offset, len)| (offset as usize, offset as usize + len))
            .collect();
        covered.push((0, header_end));
        covered.sort_unstable();

        let mut gaps = Vec::new();
        let mut cursor = 0;
        for (start, end) in covered {
            if start > cursor {
                gaps.push((cursor, bytes[cursor..start].to_vec()));
            }
            cursor = cursor.max(end);
        }
        if cursor < bytes.len() {
            gaps.push((cursor, bytes[cursor..].to_vec()));
        }

        Self {
            prefix_len: header_end,
            spans,
            gaps,
            total_len: bytes.len(),
        }
    }

    /// Whether the bodies can go back to their recorded offsets unchanged
    fn fits(&self, prefix_len: usize, directory: &[DirectoryEntry], bodies: &[Vec<u8>]) -> bool {
        if prefix_len != self.prefix_len || directory.len() != self.spans.len() {
            return false;
        }
        let same_spans = directory
            .iter()
            .zip(bodies)
            .zip(&self.spans)
            .all(|((entry, body), &(offset, len))| {
                entry.offset == offset
                    && body.len() == len
                    && offset as usize >= prefix_len
                    && offset as usize + len <= self.total_len
            });
        if !same_spans {
            return false;
        }

        // bodies may only share bytes when they are the same bytes
        let mut placed: Vec<(usize, &[u8])> = directory
            .iter()
            .zip(bodies)
            .map(|(entry, body)| (entry.offset as usize, body.as_slice()))
            .collect();
        placed.sort_unstable_by_key(|(offset, _)| *offset);
        placed.windows(2).all(|pair| {
            let (a, a_body) = pair[0];
            let (b, b_body) = pair[1];
            a + a_body.len() <= b || (a == b && a_body == b_body)
        })
    }

    fn write(&self, prefix: &[u8], directory: &[DirectoryEntry], bodies: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0; self.total_len];
        out[..prefix.len()].copy_from_slice(prefix);
        for (offset, gap) in &self.gaps {
            out[*offset..*offset + gap.len()].copy_from_slice(gap);
        }
        for (entry, body) in directory.iter().zip(bodies) {
            let at = entry.offset as usize;
            out[at..at + body.len()].copy_from_slice(body);
        }
        out
    }
}

/// A decoded compiled cartridge
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCartridge {
    pub major: u8,
    pub minor: u8,
    pub header: CompiledHeader,
    /// Entries in file order; the first one is the script
    pub directory: Vec<DirectoryEntry>,
    pub script: Vec<u8>,
    /// Media indexed by object id; slot 0 belongs to the script and is always empty
    pub media: Vec<Option<MediaBlob>>,
    layout: Option<Layout>,
}

impl CompiledCartridge {
    /// Assemble a version 2.11 cartridge; `media[k]` becomes object `k + 1`
    pub fn new(header: CompiledHeader, script: Vec<u8>, media: Vec<Option<MediaBlob>>) -> Self {
        let mut slots = Vec::with_capacity(media.len() + 1);
        slots.push(None);
        slots.extend(media);
        let directory = (0..slots.len())
            .map(|id| DirectoryEntry {
                id: id as u16,
                offset: 0,
            })
            .collect();
        Self {
            major: 2,
            minor: 11,
            header,
            directory,
            script,
            media: slots,
            layout: None,
        }
    }

    /// Parse a compiled cartridge in one pass
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if !has_signature(bytes) {
            return Err(Error::BadSignature);
        }
        let (major, minor) = (bytes[0], bytes[1]);
        if !SUPPORTED_VERSIONS.contains(&(major, minor)) {
            return Err(Error::UnsupportedVersion { major, minor });
        }

        let mut r = Reader::new(bytes);
        r.seek(SIGNATURE_LEN)?;
        let count = r.u16()?;
        if count == 0 {
            return Err(Error::EmptyDirectory);
        }

        let mut directory = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = r.u16()?;
            let offset = r.u32()?;
            directory.push(DirectoryEntry { id, offset });
        }
        check_directory(&directory, count)?;

        let declared = r.u32()?;
        let start = r.position();
        let header = CompiledHeader::read(&mut r)?;
        let actual = r.position() - start;
        if actual != declared as usize {
            return Err(Error::HeaderLength { declared, actual });
        }
        let header_end = r.position();

        let mut spans = Vec::with_capacity(directory.len());
        let script_at = directory[0].offset;
        r.seek(script_at as usize)?;
        let len = r.u32()? as usize;
        let script = r.take(len)?.to_vec();
        spans.push((script_at, r.position() - script_at as usize));

        let mut media: Vec<Option<MediaBlob>> = vec![None; count as usize];
        for entry in &directory[1..] {
            r.seek(entry.offset as usize)?;
            if r.u8()? != 0 {
                let kind = MediaType::from_code(r.i32()?);
                let len = r.u32()? as usize;
                if len == 0 {
                    return Err(Error::EmptyMedia { id: entry.id });
                }
                let bytes = r.take(len)?.to_vec();
                media[entry.id as usize] = Some(MediaBlob { kind, bytes });
            }
            spans.push((entry.offset, r.position() - entry.offset as usize));
        }

        let layout = Layout::capture(bytes, header_end, spans);
        tracing::debug!(
            major,
            minor,
            objects = count,
            script_len = script.len(),
            unclaimed = layout.gaps.iter().map(|(_, gap)| gap.len()).sum::<usize>(),
            "decoded compiled cartridge"
        );

        Ok(Self {
            major,
            minor,
            header,
            directory,
            script,
            media,
            layout: Some(layout),
        })
    }

    fn body(&self, index: usize, entry: DirectoryEntry) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        if index == 0 {
            body.extend_from_slice(&len_u32(self.script.len())?.to_le_bytes());
            body.extend_from_slice(&self.script);
            return Ok(body);
        }
        match self.media.get(entry.id as usize).and_then(|m| m.as_ref()) {
            Some(blob) => {
                if blob.bytes.is_empty() {
                    return Err(Error::EmptyMedia { id: entry.id });
                }
                body.push(1);
                body.extend_from_slice(&blob.kind.code().to_le_bytes());
                body.extend_from_slice(&len_u32(blob.bytes.len())?.to_le_bytes());
                body.extend_from_slice(&blob.bytes);
            }
            None => body.push(0),
        }
        Ok(body)
    }

    fn prefix(&self, count: u16, offsets: &[u32], header: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(SIGNATURE_LEN + 2 + 6 * offsets.len() + 4 + header.len());
        out.push(self.major);
        out.push(self.minor);
        out.extend_from_slice(TAG);
        out.extend_from_slice(&count.to_le_bytes());
        for (entry, offset) in self.directory.iter().zip(offsets) {
            out.extend_from_slice(&entry.id.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(&len_u32(header.len())?.to_le_bytes());
        out.extend_from_slice(header);
        Ok(out)
    }

    /// Write the cartridge
    ///
    /// A decoded cartridge whose bodies still have their original sizes is
    /// written back at its original offsets, unclaimed bytes included, so an
    /// unmodified file re-encodes to identical bytes. Otherwise, and for a
    /// cartridge built with `new`, objects are laid out back to back in
    /// directory order right after the header.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.directory.is_empty() {
            return Err(Error::EmptyDirectory);
        }
        let count = u16::try_from(self.directory.len())
            .map_err(|_| Error::TooManyObjects(self.directory.len()))?;
        check_directory(&self.directory, count)?;

        let mut header = Vec::new();
        self.header.write(&mut header)?;
        let bodies = self
            .directory
            .iter()
            .enumerate()
            .map(|(index, entry)| self.body(index, *entry))
            .collect::<Result<Vec<_>>>()?;

        let prefix_len = SIGNATURE_LEN + 2 + 6 * self.directory.len() + 4 + header.len();
        if let Some(layout) = &self.layout {
            if layout.fits(prefix_len, &self.directory, &bodies) {
                let offsets: Vec<u32> = self.directory.iter().map(|e| e.offset).collect();
                let prefix = self.prefix(count, &offsets, &header)?;
                return Ok(layout.write(&prefix, &self.directory, &bodies));
            }
            tracing::debug!("object sizes changed, packing compiled cartridge");
        }

        let mut offsets = Vec::with_capacity(bodies.len());
        let mut offset = prefix_len;
        for body in &bodies {
            offsets.push(len_u32(offset)?);
            offset += body.len();
        }
        let mut out = self.prefix(count, &offsets, &header)?;
        out.reserve(offset - out.len());
        for body in bodies {
            out.extend_from_slice(&body);
        }
        Ok(out)
    }

    /// Object id of the splash media, if any
    pub fn splash_id(&self) -> Option<u16> {
        u16::try_from(self.header.splash_id).ok().filter(|id| *id > 0)
    }

    /// Object id of the icon media, if any
    pub fn icon_id(&self) -> Option<u16> {
        u16::try_from(self.header.icon_id).ok().filter(|id| *id > 0)
    }
}
