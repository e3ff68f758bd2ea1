//! Texture registration, building, and table generation.

use std::path::{Path, PathBuf};

use ember_common::buffer::{Buffer, BufferError};
use ember_common::cache::{AssetCache, CacheRecord, TextureBinaryRecord, TextureInfoRecord};
use ember_common::fs::directory_iterate;
use ember_common::hash::{crc32, hash64, mix64};
use serde::Deserialize;
use thiserror::Error;

use crate::atlas::{self, AtlasError, Placement};
use crate::format::ColorFormat;
use crate::image::{Image, ImageCache, ImageError};
use crate::mip::{mip_generate_chain_2d_alloc, mip_level_count_2d, MipError};

pub const COMMENT_BREAK: &str = "////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////";

/// Contents of a `.texture` definition file.
#[derive(Debug, Deserialize)]
struct TextureDefinition {
    /// Image path relative to the definition file.
    path: String,
    #[serde(default)]
    mips: bool,
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("unable to open texture file {path}: {err}")]
    OpenDefinition {
        path: String,
        err: std::io::Error,
    },
    #[error("texture file {path} is not valid json: {err}")]
    ParseDefinition {
        path: String,
        err: serde_json::Error,
    },
    #[error("texture '{name}' has an invalid image path (required)")]
    MissingImagePath { name: String },
    #[error("texture '{name}': unable to locate image file {path}: {err}")]
    MissingImage {
        name: String,
        path: String,
        err: std::io::Error,
    },
    #[error("texture '{name}' has invalid dimensions (w: {width}, h: {height}, c: {channels})")]
    InvalidDimensions {
        name: String,
        width: u32,
        height: u32,
        channels: u32,
    },
    #[error("failed to pack texture '{name}': {err}")]
    Pack { name: String, err: AtlasError },
    #[error("failed to generate mips for texture '{name}' ({width}x{height}): {err}")]
    Mips {
        name: String,
        width: u16,
        height: u16,
        err: MipError,
    },
    #[error("failed to read cached texture '{name}' from binary: {err}")]
    CachedBinary { name: String, err: BufferError },
    #[error("attempting to write null texture '{name}' to binary")]
    NoGlyphs { name: String },
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type TextureId = usize;
pub type GlyphId = usize;

/// A packable sub-rectangle: a whole texture, or one glyph of an atlas.
#[derive(Clone, Debug, Default)]
pub struct Glyph {
    pub cache_key: u64,
    /// Image file backing this glyph; unused when `buffer` is set.
    pub texture_path: PathBuf,
    pub image_x1: u16,
    pub image_y1: u16,
    pub image_x2: u16,
    pub image_y2: u16,
    pub placement: Placement,
    /// Inline pixel data owned by the glyph itself.
    pub buffer: Option<Image>,
}

impl Glyph {
    pub fn width(&self) -> u16 {
        self.image_x2 - self.image_x1
    }

    pub fn height(&self) -> u16 {
        self.image_y2 - self.image_y1
    }
}

#[derive(Clone, Debug, Default)]
pub struct Texture {
    pub name: String,
    pub atlas_texture: bool,
    pub generate_mips: bool,
    pub glyphs: Vec<GlyphId>,
    pub glyph_cache_keys: Vec<u64>,
    pub width: u16,
    pub height: u16,
    pub levels: u16,
    pub offset: u64,
}

/// All textures of one build, plus the shared glyph table.
#[derive(Debug, Default)]
pub struct Textures {
    pub textures: Vec<Texture>,
    pub glyphs: Vec<Glyph>,
    pub file_count: u64,
    images: ImageCache,
}

impl Textures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a blank texture, or returns the existing id if the name
    /// was registered before.
    pub fn register_new(&mut self, name: &str) -> TextureId {
        for (i, texture) in self.textures.iter().enumerate() {
            if texture.name == name {
                return i;
            }
        }

        self.textures.push(Texture {
            name: name.to_owned(),
            ..Texture::default()
        });
        self.textures.len() - 1
    }

    /// Registers a blank atlas texture. Glyphs are attached afterwards via
    /// [`Textures::add_glyph`].
    pub fn register_atlas(&mut self, name: &str) -> TextureId {
        let id = self.register_new(name);
        self.textures[id].atlas_texture = true;
        id
    }

    pub fn add_glyph(&mut self, texture: TextureId, glyph: Glyph) -> GlyphId {
        let glyph_id = self.glyphs.len();
        self.textures[texture].glyph_cache_keys.push(glyph.cache_key);
        self.textures[texture].glyphs.push(glyph_id);
        self.glyphs.push(glyph);
        glyph_id
    }

    /// Registers a standalone texture from a `.texture` definition file.
    pub fn register_from_definition(
        &mut self,
        name: &str,
        path: &Path,
        cache: &mut AssetCache,
    ) -> Result<TextureId, TextureError> {
        let def_bytes = std::fs::read(path).map_err(|err| TextureError::OpenDefinition {
            path: path.display().to_string(),
            err,
        })?;
        let definition: TextureDefinition =
            serde_json::from_slice(&def_bytes).map_err(|err| TextureError::ParseDefinition {
                path: path.display().to_string(),
                err,
            })?;

        if definition.path.is_empty() {
            return Err(TextureError::MissingImagePath {
                name: name.to_owned(),
            });
        }

        let image_path = path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&definition.path);
        let image_bytes =
            std::fs::read(&image_path).map_err(|err| TextureError::MissingImage {
                name: name.to_owned(),
                path: image_path.display().to_string(),
                err,
            })?;

        // Content addressed: the key covers the definition and the image.
        let cache_key = mix64(hash64(&def_bytes), hash64(&image_bytes));

        let info = match cache.fetch_texture_info(cache_key) {
            Some(record) => record,
            None => {
                cache.dirty = true;
                let (_, info) = self.images.load(&image_path)?;
                TextureInfoRecord {
                    width: info.width,
                    height: info.height,
                    channels: info.channels,
                }
            }
        };

        if info.width == 0 || info.height == 0 || info.channels == 0 {
            return Err(TextureError::InvalidDimensions {
                name: name.to_owned(),
                width: info.width,
                height: info.height,
                channels: info.channels,
            });
        }
        if info.width > u32::from(u16::MAX) || info.height > u32::from(u16::MAX) || info.channels > 4
        {
            return Err(TextureError::InvalidDimensions {
                name: name.to_owned(),
                width: info.width,
                height: info.height,
                channels: info.channels,
            });
        }

        let id = self.register_new(name);
        self.textures[id].atlas_texture = false;
        self.textures[id].generate_mips = definition.mips;

        self.add_glyph(
            id,
            Glyph {
                cache_key,
                texture_path: image_path,
                image_x1: 0,
                image_y1: 0,
                image_x2: info.width as u16,
                image_y2: info.height as u16,
                ..Glyph::default()
            },
        );

        cache.store(cache_key, CacheRecord::TextureInfo(info));
        Ok(id)
    }

    /// Discovers every `.texture` file under `dir` and registers it.
    pub fn gather(
        &mut self,
        dir: &Path,
        recurse: bool,
        cache: &mut AssetCache,
    ) -> Result<usize, TextureError> {
        let files = directory_iterate(dir, "texture", recurse)?;

        for file in &files {
            self.file_count += 1;
            self.register_from_definition(&file.name, &file.path, cache)?;
        }

        Ok(files.len())
    }

    /// Builds every registered texture into the binary blob and emits the
    /// generated lookup tables.
    ///
    /// `previous_blob` is the blob written by the last build; cached
    /// entries are spliced out of it without re-encoding.
    pub fn build(
        &mut self,
        binary: &mut Buffer,
        cache: &mut AssetCache,
        previous_blob: Option<&Path>,
        header: &mut String,
        source: &mut String,
    ) -> Result<(), TextureError> {
        for index in 0..self.textures.len() {
            self.build_texture(index, binary, cache, previous_blob)?;
        }

        self.write_header(header);
        self.write_source(source);
        Ok(())
    }

    fn build_texture(
        &mut self,
        index: TextureId,
        binary: &mut Buffer,
        cache: &mut AssetCache,
        previous_blob: Option<&Path>,
    ) -> Result<(), TextureError> {
        let name = self.textures[index].name.clone();
        let glyph_ids = self.textures[index].glyphs.clone();
        // Standalone textures hold exactly one glyph; atlases at least one.
        if glyph_ids.is_empty() || (!self.textures[index].atlas_texture && glyph_ids.len() != 1) {
            return Err(TextureError::NoGlyphs { name });
        }

        // Texture cache key: checksum over the glyph keys.
        let mut key_bytes = Vec::with_capacity(self.textures[index].glyph_cache_keys.len() * 8);
        for key in &self.textures[index].glyph_cache_keys {
            key_bytes.extend_from_slice(&key.to_le_bytes());
        }
        let cache_key = u64::from(crc32(&key_bytes, 0));

        if self.textures[index].atlas_texture {
            // Pack the atlas up front; glyph UVs are needed by dependent
            // tables even when the pixels come from the cache.
            let sizes: Vec<(u16, u16)> = glyph_ids
                .iter()
                .map(|&id| (self.glyphs[id].width(), self.glyphs[id].height()))
                .collect();
            let (size, placements) =
                atlas::pack(&sizes, 1).map_err(|err| TextureError::Pack {
                    name: name.clone(),
                    err,
                })?;
            for (&id, placement) in glyph_ids.iter().zip(&placements) {
                self.glyphs[id].placement = *placement;
            }
            self.textures[index].width = size;
            self.textures[index].height = size;
            self.textures[index].levels = 1;

            let cached = cache.fetch_texture_binary(cache_key);
            if let (Some(record), Some(previous)) = (cached, previous_blob) {
                let offset = binary
                    .write_from_file(previous, record.offset, record.size as usize)
                    .map_err(|err| TextureError::CachedBinary {
                        name: name.clone(),
                        err,
                    })?;
                self.textures[index].offset = offset as u64;
                cache.store(
                    cache_key,
                    CacheRecord::TextureBinary(TextureBinaryRecord {
                        offset: offset as u64,
                        ..record
                    }),
                );
                tracing::info!("texture (cached) {name}");
            } else {
                cache.dirty = true;

                let mut pixels = Image::new(size, size);
                for &id in &glyph_ids {
                    let glyph = self.glyphs[id].clone();
                    let image = match &self.glyphs[id].buffer {
                        Some(buffer) => buffer.clone(),
                        None => self.images.load(&glyph.texture_path)?.0.clone(),
                    };
                    pixels.splice(
                        &image,
                        glyph.image_x1,
                        glyph.image_y1,
                        glyph.image_x2,
                        glyph.image_y2,
                        glyph.placement.x1,
                        glyph.placement.y1,
                    );
                }

                let offset = binary.write(&pixels.pixels) as u64;
                self.textures[index].offset = offset;
                cache.store(
                    cache_key,
                    CacheRecord::TextureBinary(TextureBinaryRecord {
                        width: u32::from(size),
                        height: u32::from(size),
                        channels: 4,
                        levels: 1,
                        offset,
                        size: pixels.size_bytes() as u64,
                    }),
                );
                tracing::info!("texture (built) {name}");
            }
        } else {
            let cached = cache.fetch_texture_binary(cache_key);
            if let (Some(record), Some(previous)) = (cached, previous_blob) {
                self.textures[index].width = record.width as u16;
                self.textures[index].height = record.height as u16;
                self.textures[index].levels = record.levels as u16;

                let offset = binary
                    .write_from_file(previous, record.offset, record.size as usize)
                    .map_err(|err| TextureError::CachedBinary {
                        name: name.clone(),
                        err,
                    })?;
                self.textures[index].offset = offset as u64;
                cache.store(
                    cache_key,
                    CacheRecord::TextureBinary(TextureBinaryRecord {
                        offset: offset as u64,
                        ..record
                    }),
                );
                tracing::info!("texture (cached) {name}");
            } else {
                cache.dirty = true;

                let glyph = &self.glyphs[glyph_ids[0]];
                let image = match &glyph.buffer {
                    Some(buffer) => buffer.clone(),
                    None => self.images.load(&glyph.texture_path)?.0.clone(),
                };

                let width = image.width;
                let height = image.height;
                self.textures[index].width = width;
                self.textures[index].height = height;

                let (levels, bytes) = if self.textures[index].generate_mips {
                    let levels = mip_level_count_2d(width, height);
                    let chain = mip_generate_chain_2d_alloc(
                        &image.pixels,
                        width,
                        height,
                        ColorFormat::Rgba8Float,
                    )
                    .map_err(|err| TextureError::Mips {
                        name: name.clone(),
                        width,
                        height,
                        err,
                    })?;
                    (levels, chain)
                } else {
                    (1, image.pixels)
                };

                self.textures[index].levels = levels;
                let offset = binary.write(&bytes) as u64;
                self.textures[index].offset = offset;
                cache.store(
                    cache_key,
                    CacheRecord::TextureBinary(TextureBinaryRecord {
                        width: u32::from(width),
                        height: u32::from(height),
                        channels: 4,
                        levels: u32::from(levels),
                        offset,
                        size: bytes.len() as u64,
                    }),
                );
                tracing::info!("texture (built) {name}");
            }
        }

        Ok(())
    }

    fn write_header(&self, header: &mut String) {
        header.push_str(COMMENT_BREAK);
        header.push_str("\n\n");

        header.push_str("enum_class\n(\n\tTexture, u32,\n\n");
        for texture in &self.textures {
            header.push('\t');
            header.push_str(&texture.name);
            header.push_str(",\n");
        }
        header.push_str("\n\tNull = 0,\n);\n\n");

        header.push_str("namespace Assets { struct TextureEntry; }\n\n");

        header.push_str("namespace CoreAssets\n{\n");
        header.push_str(&format!(
            "\tconstexpr u32 textureCount = {};\n",
            self.textures.len()
        ));
        if self.textures.is_empty() {
            header.push_str("\textern const Assets::TextureEntry *textures;\n");
        } else {
            header.push_str("\textern const Assets::TextureEntry textures[];\n");
        }
        header.push_str("}\n\n");
    }

    fn write_source(&self, source: &mut String) {
        source.push_str(COMMENT_BREAK);
        source.push_str("\n\n");
        source.push_str("namespace CoreAssets\n{\n");

        if self.textures.is_empty() {
            source.push_str("\tconst Assets::TextureEntry *textures = nullptr;\n");
        } else {
            source.push_str("\tconst Assets::TextureEntry textures[textureCount] =\n\t{\n");
            for texture in &self.textures {
                source.push_str(&format!(
                    "\t\t{{ BINARY_OFFSET_ASSETS + {}LLU, {}, {}, {} }}, // {}\n",
                    texture.offset, texture.width, texture.height, texture.levels, texture.name
                ));
            }
            source.push_str("\t};\n");
        }

        source.push_str("}\n\n");
    }
}

#[cfg(test)]
mod tests {
    use ember_common::buffer::Buffer;
    use ember_common::cache::AssetCache;

    use super::{Glyph, Textures};
    use crate::image::Image;

    fn solid_image(width: u16, height: u16, value: u8) -> Image {
        Image {
            width,
            height,
            pixels: vec![value; usize::from(width) * usize::from(height) * 4],
        }
    }

    fn inline_glyph(key: u64, image: Image) -> Glyph {
        Glyph {
            cache_key: key,
            image_x2: image.width,
            image_y2: image.height,
            buffer: Some(image),
            ..Glyph::default()
        }
    }

    #[test]
    fn register_new_dedupes_by_name() {
        let mut textures = Textures::new();
        let a = textures.register_new("ui");
        let b = textures.register_new("ui");
        assert_eq!(a, b);
        assert_eq!(textures.textures.len(), 1);
    }

    #[test]
    fn standalone_build_writes_pixels() {
        let mut textures = Textures::new();
        let id = textures.register_new("white");
        textures.add_glyph(id, inline_glyph(11, solid_image(2, 2, 255)));

        let mut binary = Buffer::new();
        let mut cache = AssetCache::new();
        let mut header = String::new();
        let mut source = String::new();
        textures
            .build(&mut binary, &mut cache, None, &mut header, &mut source)
            .unwrap();

        assert_eq!(binary.len(), 2 * 2 * 4);
        assert!(cache.dirty);
        assert!(header.contains("white,"));
        assert!(header.contains("textureCount = 1"));
        assert!(source.contains("BINARY_OFFSET_ASSETS + 0LLU, 2, 2, 1 }, // white"));
    }

    #[test]
    fn standalone_build_generates_mips() {
        let mut textures = Textures::new();
        let id = textures.register_new("mipped");
        textures.add_glyph(id, inline_glyph(12, solid_image(4, 4, 100)));
        textures.textures[id].generate_mips = true;

        let mut binary = Buffer::new();
        let mut cache = AssetCache::new();
        textures
            .build(
                &mut binary,
                &mut cache,
                None,
                &mut String::new(),
                &mut String::new(),
            )
            .unwrap();

        // 4 * (16 + 4 + 1) chain bytes.
        assert_eq!(binary.len(), 84);
        assert_eq!(textures.textures[id].levels, 3);
        // Every generated level averages identical texels.
        assert!(binary.as_slice().iter().all(|&b| b == 100));
    }

    #[test]
    fn atlas_build_splices_glyphs() {
        let mut textures = Textures::new();
        let id = textures.register_atlas("atlas");
        textures.add_glyph(id, inline_glyph(1, solid_image(10, 10, 1)));
        textures.add_glyph(id, inline_glyph(2, solid_image(6, 6, 2)));

        let mut binary = Buffer::new();
        let mut cache = AssetCache::new();
        textures
            .build(
                &mut binary,
                &mut cache,
                None,
                &mut String::new(),
                &mut String::new(),
            )
            .unwrap();

        let size = textures.textures[id].width;
        assert_eq!(size, 32);
        assert_eq!(binary.len(), usize::from(size) * usize::from(size) * 4);

        // Both glyphs landed inside the atlas with their own pixels.
        let glyph0 = &textures.glyphs[0];
        let glyph1 = &textures.glyphs[1];
        let texel = |x: u16, y: u16| {
            binary.as_slice()[(usize::from(y) * usize::from(size) + usize::from(x)) * 4]
        };
        assert_eq!(texel(glyph0.placement.x1, glyph0.placement.y1), 1);
        assert_eq!(texel(glyph1.placement.x1, glyph1.placement.y1), 2);
    }

    #[test]
    fn register_from_definition_parses_json() {
        let dir = std::env::temp_dir().join("ember_texture_def_test");
        std::fs::create_dir_all(&dir).unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]))
            .save(dir.join("grass.png"))
            .unwrap();
        let def_path = dir.join("grass.texture");
        std::fs::write(&def_path, r#"{ "path": "grass.png", "mips": true }"#).unwrap();

        let mut textures = Textures::new();
        let mut cache = AssetCache::new();
        let id = textures
            .register_from_definition("grass", &def_path, &mut cache)
            .unwrap();

        assert!(cache.dirty);
        assert!(textures.textures[id].generate_mips);
        assert!(!textures.textures[id].atlas_texture);
        let glyph = &textures.glyphs[textures.textures[id].glyphs[0]];
        assert_eq!((glyph.width(), glyph.height()), (4, 4));

        // Second registration run with the populated cache probes nothing.
        cache.dirty = false;
        let mut fresh = Textures::new();
        fresh
            .register_from_definition("grass", &def_path, &mut cache)
            .unwrap();
        assert!(!cache.dirty);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bad_definition_is_an_error() {
        let dir = std::env::temp_dir().join("ember_texture_bad_def_test");
        std::fs::create_dir_all(&dir).unwrap();
        let def_path = dir.join("broken.texture");
        std::fs::write(&def_path, r#"{ "path": "missing.png" }"#).unwrap();

        let mut textures = Textures::new();
        let mut cache = AssetCache::new();
        assert!(textures
            .register_from_definition("broken", &def_path, &mut cache)
            .is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn second_build_takes_the_cached_path() {
        let dir = std::env::temp_dir().join("ember_texture_cache_test");
        std::fs::create_dir_all(&dir).unwrap();
        let blob_path = dir.join("assets.bin");

        let build = |cache: &mut AssetCache, previous: Option<&std::path::Path>| {
            let mut textures = Textures::new();
            let id = textures.register_new("white");
            textures.add_glyph(id, inline_glyph(11, solid_image(2, 2, 255)));
            let mut binary = Buffer::new();
            textures
                .build(
                    &mut binary,
                    cache,
                    previous,
                    &mut String::new(),
                    &mut String::new(),
                )
                .unwrap();
            binary
        };

        let mut cache = AssetCache::new();
        let first = build(&mut cache, None);
        first.save(&blob_path).unwrap();
        assert!(cache.dirty);

        cache.dirty = false;
        let second = build(&mut cache, Some(&blob_path));
        assert!(!cache.dirty);
        assert_eq!(first.as_slice(), second.as_slice());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
