//! Media bytes bound to the cartridge's media objects

use crate::error::Result;
use indexmap::IndexMap;
use waypost_core::{Cartridge, MediaResource, ObjectId, ObjectSpec};
use waypost_format::{MediaKey, MediaTable};

/// Bytes of every media object that has data in the container
///
/// The library is filled once while loading and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AssetLibrary {
    blobs: IndexMap<ObjectId, Vec<u8>>,
}

impl AssetLibrary {
    pub fn get(&self, media: ObjectId) -> Option<&[u8]> {
        self.blobs.get(&media).map(Vec::as_slice)
    }

    pub fn contains(&self, media: ObjectId) -> bool {
        self.blobs.contains_key(&media)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    fn insert(&mut self, media: ObjectId, bytes: Vec<u8>) {
        self.blobs.insert(media, bytes);
    }
}

/// Media objects with the key their data is stored under
fn media_keys(cartridge: &Cartridge, table: &MediaTable) -> Vec<(ObjectId, Option<MediaKey>)> {
    cartridge
        .objects()
        .filter_map(|o| o.as_media().map(|m| (o.id, m)))
        .map(|(id, media)| {
            let key = match table {
                MediaTable::Indexed(_) => media.asset_index.map(MediaKey::Index),
                MediaTable::Named(_) => media
                    .resources
                    .first()
                    .map(|r| MediaKey::File(r.filename.to_lowercase())),
            };
            (id, key)
        })
        .collect()
}

/// Resolves container entries, consuming each entry's bytes on first use
struct Binder {
    table: MediaTable,
    library: AssetLibrary,
    bound: IndexMap<MediaKey, ObjectId>,
}

impl Binder {
    fn take(&mut self, key: &MediaKey) -> Option<Vec<u8>> {
        match (&mut self.table, key) {
            (MediaTable::Indexed(blobs), MediaKey::Index(index)) => blobs
                .get_mut(*index as usize)
                .and_then(Option::take)
                .map(|blob| blob.bytes),
            (MediaTable::Named(files), MediaKey::File(name)) => files.shift_remove(name),
            _ => None,
        }
    }

    fn bind(&mut self, media: ObjectId, key: MediaKey) -> bool {
        if let Some(bytes) = self.take(&key) {
            self.library.insert(media, bytes);
            self.bound.insert(key, media);
            return true;
        }
        // Several media objects may name the same file
        let shared = self
            .bound
            .get(&key)
            .and_then(|owner| self.library.get(*owner))
            .map(<[u8]>::to_vec);
        match shared {
            Some(bytes) => {
                self.library.insert(media, bytes);
                true
            }
            None => false,
        }
    }

    /// Media object for the icon or splash entry, registering one if the
    /// entry is not claimed by the script
    fn resolve(
        &mut self,
        cartridge: &mut Cartridge,
        key: MediaKey,
        role: &str,
    ) -> Result<Option<ObjectId>> {
        if let Some(media) = self.bound.get(&key) {
            return Ok(Some(*media));
        }
        let Some(bytes) = self.take(&key) else {
            tracing::warn!(role, ?key, "container has no data for the cartridge image");
            return Ok(None);
        };
        let resources = match &key {
            MediaKey::File(name) => vec![MediaResource::from_filename(name.as_str())],
            MediaKey::Index(_) => Vec::new(),
        };
        let spec = ObjectSpec::named(role).with_visible(false);
        let media = cartridge.register_media(spec, resources)?;
        self.library.insert(media, bytes);
        self.bound.insert(key, media);
        Ok(Some(media))
    }

    fn report_unused(&self) {
        match &self.table {
            MediaTable::Indexed(blobs) => {
                for (index, _) in blobs.iter().enumerate().filter(|(_, b)| b.is_some()) {
                    tracing::info!(index, "media entry not used by any media object");
                }
            }
            MediaTable::Named(files) => {
                for name in files.keys() {
                    tracing::info!(file = %name, "archive file not used by any media object");
                }
            }
        }
    }
}

/// Attach container media to the cartridge's media objects
///
/// Runs inside the load cycle once the script host has registered its
/// objects. A media object whose data is absent is reported and left
/// unbound; playing it later fails with `MissingAsset`.
pub(crate) fn bind_media(
    cartridge: &mut Cartridge,
    table: MediaTable,
    icon: Option<MediaKey>,
    splash: Option<MediaKey>,
) -> Result<AssetLibrary> {
    let keys = media_keys(cartridge, &table);
    let mut binder = Binder {
        table,
        library: AssetLibrary::default(),
        bound: IndexMap::new(),
    };

    for (media, key) in keys {
        let Some(key) = key else {
            tracing::warn!(%media, "media object has no resource to bind");
            continue;
        };
        if !binder.bind(media, key.clone()) {
            tracing::warn!(%media, ?key, "media object has no data in the container");
        }
    }

    if let Some(key) = icon {
        let media = binder.resolve(cartridge, key, "icon")?;
        cartridge.set_icon(media)?;
    }
    if let Some(key) = splash {
        let media = binder.resolve(cartridge, key, "splash")?;
        cartridge.set_splash(media)?;
    }

    binder.report_unused();
    tracing::debug!(bound = binder.library.len(), "media bound");
    Ok(binder.library)
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypost_core::{CartridgeMeta, MediaType};
    use waypost_format::MediaBlob;

    fn blob(bytes: &[u8]) -> Option<MediaBlob> {
        Some(MediaBlob {
            kind: MediaType::Png,
            bytes: bytes.to_vec(),
        })
    }

    fn cartridge_with_media(files: &[&str]) -> (Cartridge, Vec<ObjectId>) {
        let mut cartridge = Cartridge::new(CartridgeMeta::default());
        cartridge.begin_cycle().unwrap();
        let ids = files
            .iter()
            .map(|f| {
                cartridge
                    .register_media(ObjectSpec::named(*f), vec![MediaResource::from_filename(*f)])
                    .unwrap()
            })
            .collect();
        (cartridge, ids)
    }

    #[test]
    fn test_bind_indexed() {
        let (mut cartridge, ids) = cartridge_with_media(&["a.png", "b.png", "c.png"]);
        let table = MediaTable::Indexed(vec![None, blob(b"aa"), None, blob(b"cc"), blob(b"dd")]);

        let library = bind_media(&mut cartridge, table, None, Some(MediaKey::Index(1))).unwrap();

        assert_eq!(library.get(ids[0]), Some(&b"aa"[..]));
        assert!(!library.contains(ids[1]));
        assert_eq!(library.get(ids[2]), Some(&b"cc"[..]));
        assert_eq!(cartridge.splash(), Some(ids[0]));
        assert_eq!(cartridge.icon(), None);
    }

    #[test]
    fn test_unclaimed_icon_registered() {
        let (mut cartridge, _) = cartridge_with_media(&["a.png"]);
        let table = MediaTable::Indexed(vec![None, blob(b"aa"), blob(b"icon")]);

        let library = bind_media(&mut cartridge, table, Some(MediaKey::Index(2)), None).unwrap();

        let icon = cartridge.icon().unwrap();
        assert_eq!(cartridge.object(icon).unwrap().name, "icon");
        assert_eq!(library.get(icon), Some(&b"icon"[..]));
    }

    #[test]
    fn test_bind_named_case_insensitive() {
        let (mut cartridge, ids) = cartridge_with_media(&["Logo.PNG", "logo.png", "missing.wav"]);
        let mut files = IndexMap::new();
        files.insert("logo.png".to_string(), b"png".to_vec());
        files.insert("extra.txt".to_string(), b"x".to_vec());

        let library = bind_media(&mut cartridge, MediaTable::Named(files), None, None).unwrap();

        assert_eq!(library.get(ids[0]), Some(&b"png"[..]));
        assert_eq!(library.get(ids[1]), Some(&b"png"[..]));
        assert!(!library.contains(ids[2]));
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn test_named_splash_file() {
        let (mut cartridge, _) = cartridge_with_media(&[]);
        let mut files = IndexMap::new();
        files.insert("splash.jpg".to_string(), b"jpg".to_vec());

        let library = bind_media(
            &mut cartridge,
            MediaTable::Named(files),
            Some(MediaKey::File("absent.png".to_string())),
            Some(MediaKey::File("splash.jpg".to_string())),
        )
        .unwrap();

        let splash = cartridge.splash().unwrap();
        let media = cartridge.object(splash).unwrap().as_media().unwrap();
        assert_eq!(media.resources[0].kind, MediaType::Jpg);
        assert_eq!(library.get(splash), Some(&b"jpg"[..]));
        assert_eq!(cartridge.icon(), None);
    }
}
