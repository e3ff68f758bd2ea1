//! Content-addressed asset cache.
//!
//! Maps 64-bit cache keys to small POD records describing where a compiled
//! asset landed in the previous build. Read at build start, written on
//! success; any record mutation in between marks the cache dirty.

use std::collections::BTreeMap;
use std::path::Path;

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::codec::{Decode, Encode, EofError};

pub const MAGIC: [u8; 4] = *b"EMBC";
pub const VERSION: u32 = 1;

pub type CacheKey = u64;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Eof(#[from] EofError),
    #[error("bad cache magic")]
    BadMagic,
    #[error("unsupported cache version {0}")]
    BadVersion(u32),
    #[error("invalid cache record kind {0}")]
    InvalidKind(u8),
}

/// Image geometry remembered from texture registration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureInfoRecord {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

/// On-disk layout of a compiled texture in the previous binary blob.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureBinaryRecord {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub levels: u32,
    pub offset: u64,
    pub size: u64,
}

/// Presence marker for a source file that was up to date last build.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StampRecord;

/// Number of source files seen last build; invalidates on add/remove.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FileCountRecord {
    pub count: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheRecord {
    TextureInfo(TextureInfoRecord),
    TextureBinary(TextureBinaryRecord),
    Stamp(StampRecord),
    FileCount(FileCountRecord),
}

impl CacheRecord {
    const fn kind(&self) -> u8 {
        match self {
            Self::TextureInfo(_) => 1,
            Self::TextureBinary(_) => 2,
            Self::Stamp(_) => 3,
            Self::FileCount(_) => 4,
        }
    }
}

impl Encode for TextureInfoRecord {
    fn encode<B>(&self, mut buf: B)
    where
        B: BufMut,
    {
        self.width.encode(&mut buf);
        self.height.encode(&mut buf);
        self.channels.encode(&mut buf);
    }
}

impl Decode for TextureInfoRecord {
    type Error = EofError;

    fn decode<B>(mut buf: B) -> Result<Self, Self::Error>
    where
        B: Buf,
    {
        Ok(Self {
            width: u32::decode(&mut buf)?,
            height: u32::decode(&mut buf)?,
            channels: u32::decode(&mut buf)?,
        })
    }
}

impl Encode for TextureBinaryRecord {
    fn encode<B>(&self, mut buf: B)
    where
        B: BufMut,
    {
        self.width.encode(&mut buf);
        self.height.encode(&mut buf);
        self.channels.encode(&mut buf);
        self.levels.encode(&mut buf);
        self.offset.encode(&mut buf);
        self.size.encode(&mut buf);
    }
}

impl Decode for TextureBinaryRecord {
    type Error = EofError;

    fn decode<B>(mut buf: B) -> Result<Self, Self::Error>
    where
        B: Buf,
    {
        Ok(Self {
            width: u32::decode(&mut buf)?,
            height: u32::decode(&mut buf)?,
            channels: u32::decode(&mut buf)?,
            levels: u32::decode(&mut buf)?,
            offset: u64::decode(&mut buf)?,
            size: u64::decode(&mut buf)?,
        })
    }
}

impl Encode for CacheRecord {
    fn encode<B>(&self, mut buf: B)
    where
        B: BufMut,
    {
        self.kind().encode(&mut buf);
        match self {
            Self::TextureInfo(record) => record.encode(&mut buf),
            Self::TextureBinary(record) => record.encode(&mut buf),
            Self::Stamp(StampRecord) => {}
            Self::FileCount(record) => record.count.encode(&mut buf),
        }
    }
}

impl Decode for CacheRecord {
    type Error = CacheError;

    fn decode<B>(mut buf: B) -> Result<Self, Self::Error>
    where
        B: Buf,
    {
        let kind = u8::decode(&mut buf)?;
        match kind {
            1 => Ok(Self::TextureInfo(TextureInfoRecord::decode(&mut buf)?)),
            2 => Ok(Self::TextureBinary(TextureBinaryRecord::decode(&mut buf)?)),
            3 => Ok(Self::Stamp(StampRecord)),
            4 => Ok(Self::FileCount(FileCountRecord {
                count: u64::decode(&mut buf)?,
            })),
            _ => Err(CacheError::InvalidKind(kind)),
        }
    }
}

/// The cache proper.
///
/// Entries live in a `BTreeMap` so the on-disk encoding is key-ordered and
/// byte-identical between runs with identical content.
#[derive(Clone, Debug, Default)]
pub struct AssetCache {
    entries: BTreeMap<CacheKey, CacheRecord>,
    pub dirty: bool,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fetch(&self, key: CacheKey) -> Option<CacheRecord> {
        self.entries.get(&key).copied()
    }

    pub fn fetch_texture_info(&self, key: CacheKey) -> Option<TextureInfoRecord> {
        match self.fetch(key) {
            Some(CacheRecord::TextureInfo(record)) => Some(record),
            _ => None,
        }
    }

    pub fn fetch_texture_binary(&self, key: CacheKey) -> Option<TextureBinaryRecord> {
        match self.fetch(key) {
            Some(CacheRecord::TextureBinary(record)) => Some(record),
            _ => None,
        }
    }

    pub fn fetch_file_count(&self, key: CacheKey) -> Option<u64> {
        match self.fetch(key) {
            Some(CacheRecord::FileCount(record)) => Some(record.count),
            _ => None,
        }
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn store(&mut self, key: CacheKey, record: CacheRecord) {
        self.entries.insert(key, record);
    }

    pub fn read(path: &Path) -> Result<Self, CacheError> {
        let bytes = std::fs::read(path)?;
        let mut buf = bytes.as_slice();

        let magic = <[u8; 4]>::decode(&mut buf)?;
        if magic != MAGIC {
            return Err(CacheError::BadMagic);
        }

        let version = u32::decode(&mut buf)?;
        if version != VERSION {
            return Err(CacheError::BadVersion(version));
        }

        let count = u64::decode(&mut buf)?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let key = u64::decode(&mut buf)?;
            let record = CacheRecord::decode(&mut buf)?;
            entries.insert(key, record);
        }

        Ok(Self {
            entries,
            dirty: false,
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), CacheError> {
        let mut bytes = Vec::new();
        MAGIC.encode(&mut bytes);
        VERSION.encode(&mut bytes);
        (self.entries.len() as u64).encode(&mut bytes);
        for (key, record) in &self.entries {
            key.encode(&mut bytes);
            record.encode(&mut bytes);
        }

        // Write to a sibling then rename, so a crash never leaves a
        // truncated cache behind.
        let tmp = path.with_extension("cache.tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AssetCache, CacheRecord, FileCountRecord, StampRecord, TextureBinaryRecord};

    #[test]
    fn store_fetch_round_trip() {
        let mut cache = AssetCache::new();
        assert!(cache.fetch(7).is_none());

        let record = TextureBinaryRecord {
            width: 64,
            height: 32,
            channels: 4,
            levels: 6,
            offset: 4096,
            size: 10922,
        };
        cache.store(7, CacheRecord::TextureBinary(record));
        assert_eq!(cache.fetch_texture_binary(7), Some(record));

        // Typed fetch rejects a kind mismatch.
        assert!(cache.fetch_texture_info(7).is_none());
    }

    #[test]
    fn file_round_trip() {
        let dir = std::env::temp_dir().join("ember_cache_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("build.cache");

        let mut cache = AssetCache::new();
        cache.store(
            0,
            CacheRecord::FileCount(FileCountRecord { count: 3 }),
        );
        cache.store(0xDEAD_BEEF, CacheRecord::Stamp(StampRecord));
        cache.store(
            42,
            CacheRecord::TextureBinary(TextureBinaryRecord {
                width: 8,
                height: 8,
                channels: 4,
                levels: 1,
                offset: 0,
                size: 256,
            }),
        );
        cache.write(&path).unwrap();

        let loaded = AssetCache::read(&path).unwrap();
        assert!(!loaded.dirty);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.fetch_file_count(0), Some(3));
        assert!(loaded.contains(0xDEAD_BEEF));
        assert_eq!(loaded.fetch_texture_binary(42).unwrap().size, 256);

        // Identical content encodes to identical bytes.
        let path2 = dir.join("build2.cache");
        loaded.write(&path2).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), std::fs::read(&path2).unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = std::env::temp_dir().join("ember_cache_test_corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("build.cache");
        std::fs::write(&path, b"not a cache").unwrap();

        assert!(AssetCache::read(&path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
