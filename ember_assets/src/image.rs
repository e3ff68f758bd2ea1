//! Decoded pixel buffers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to open image {path}: {err}")]
    Open {
        path: String,
        err: std::io::Error,
    },
    #[error("failed to decode image {path}: {err}")]
    Decode {
        path: String,
        err: image::ImageError,
    },
}

/// An owned RGBA8 pixel buffer.
#[derive(Clone, Debug, Default)]
pub struct Image {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u8>,
}

impl Image {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; usize::from(width) * usize::from(height) * 4],
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }

    /// Copies the sub-rectangle `(sx1, sy1)..(sx2, sy2)` of `src` into
    /// this image at `(dx, dy)`.
    ///
    /// Ranges must be inside both images.
    pub fn splice(&mut self, src: &Image, sx1: u16, sy1: u16, sx2: u16, sy2: u16, dx: u16, dy: u16) {
        debug_assert!(sx2 <= src.width && sy2 <= src.height);
        debug_assert!(dx + (sx2 - sx1) <= self.width && dy + (sy2 - sy1) <= self.height);

        let row_bytes = usize::from(sx2 - sx1) * 4;
        for row in 0..usize::from(sy2 - sy1) {
            let src_start = ((usize::from(sy1) + row) * usize::from(src.width) + usize::from(sx1)) * 4;
            let dst_start = ((usize::from(dy) + row) * usize::from(self.width) + usize::from(dx)) * 4;
            self.pixels[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src.pixels[src_start..src_start + row_bytes]);
        }
    }
}

/// Probed image geometry, prior to any validation.
#[derive(Copy, Clone, Debug)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

/// Decoded images memoized by path for the duration of one build, so an
/// image referenced by several glyphs is decoded once.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<PathBuf, (Image, ImageInfo)>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> Result<(&Image, ImageInfo), ImageError> {
        if !self.images.contains_key(path) {
            let reader = image::ImageReader::open(path)
                .map_err(|err| ImageError::Open {
                    path: path.display().to_string(),
                    err,
                })?
                .with_guessed_format()
                .map_err(|err| ImageError::Open {
                    path: path.display().to_string(),
                    err,
                })?;

            let decoded = reader.decode().map_err(|err| ImageError::Decode {
                path: path.display().to_string(),
                err,
            })?;

            let info = ImageInfo {
                width: decoded.width(),
                height: decoded.height(),
                channels: u32::from(decoded.color().channel_count()),
            };

            let rgba = decoded.into_rgba8();
            let image = Image {
                width: info.width as u16,
                height: info.height as u16,
                pixels: rgba.into_raw(),
            };

            tracing::debug!("decoded {} ({}x{})", path.display(), info.width, info.height);
            self.images.insert(path.to_path_buf(), (image, info));
        }

        let (image, info) = &self.images[path];
        Ok((image, *info))
    }
}

#[cfg(test)]
mod tests {
    use super::Image;

    #[test]
    fn splice_copies_rows() {
        let mut src = Image::new(2, 2);
        src.pixels = vec![
            1, 1, 1, 1, 2, 2, 2, 2, //
            3, 3, 3, 3, 4, 4, 4, 4,
        ];

        let mut dst = Image::new(4, 4);
        dst.splice(&src, 0, 0, 2, 2, 1, 1);

        let texel = |x: usize, y: usize| dst.pixels[(y * 4 + x) * 4];
        assert_eq!(texel(1, 1), 1);
        assert_eq!(texel(2, 1), 2);
        assert_eq!(texel(1, 2), 3);
        assert_eq!(texel(2, 2), 4);
        assert_eq!(texel(0, 0), 0);
        assert_eq!(texel(3, 3), 0);
    }
}
