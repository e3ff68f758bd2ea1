//! Mip chain synthesis.
//!
//! Levels are stored contiguously: level 0 first, then halved (floor)
//! dimensions down to 1x1. Downsampling is a 2x2 box filter; integer
//! formats divide by 4, float formats multiply by 0.25.

use thiserror::Error;

use crate::format::ColorFormat;

/// Hard cap on levels in a chain regardless of dimensions.
pub const MIP_DEPTH_MAX: u16 = 16;

#[derive(Debug, Error)]
pub enum MipError {
    #[error("invalid color format: {0:?}")]
    InvalidFormat(ColorFormat),
    #[error("invalid level count {levels} for dimensions {width}x{height}")]
    InvalidLevelCount {
        width: u16,
        height: u16,
        levels: u16,
    },
    #[error("cannot generate mip for input dimensions {width}x{height}")]
    SourceTooSmall { width: u16, height: u16 },
    #[error("buffer size mismatch: expected {expected} bytes, got {got}")]
    SizeMismatch { expected: usize, got: usize },
}

/// Number of levels in a full chain for a `width` x `height` image.
pub fn mip_level_count_2d(width: u16, height: u16) -> u16 {
    let mut width = width;
    let mut height = height;
    let mut levels = 1;
    while width > 1 && height > 1 {
        width >>= 1;
        height >>= 1;
        levels += 1;
    }
    levels
}

/// Whether `levels` mips can be generated for the given dimensions.
pub fn mip_level_validate_2d(width: u16, height: u16, levels: u16) -> bool {
    levels <= mip_level_count_2d(width, height) && levels <= MIP_DEPTH_MAX
}

/// Total byte size of a chain with `levels` levels.
pub fn mip_buffer_size_2d(
    width: u16,
    height: u16,
    levels: u16,
    format: ColorFormat,
) -> Result<usize, MipError> {
    if format == ColorFormat::None {
        return Err(MipError::InvalidFormat(format));
    }
    if !mip_level_validate_2d(width, height, levels) {
        return Err(MipError::InvalidLevelCount {
            width,
            height,
            levels,
        });
    }

    let mut width = usize::from(width);
    let mut height = usize::from(height);
    let mut count = 0;
    for _ in 0..levels {
        count += width * height;
        width >>= 1;
        height >>= 1;
    }

    Ok(format.bytes_per_pixel() * count)
}

fn unpack_rgb10a2(word: u32) -> [u32; 4] {
    [
        word & 0x3FF,
        (word >> 10) & 0x3FF,
        (word >> 20) & 0x3FF,
        (word >> 30) & 0x3,
    ]
}

fn pack_rgb10a2(channels: [u32; 4]) -> u32 {
    (channels[0] & 0x3FF)
        | ((channels[1] & 0x3FF) << 10)
        | ((channels[2] & 0x3FF) << 20)
        | ((channels[3] & 0x3) << 30)
}

/// Averages four texels of `bpp` bytes each into `out`.
fn filter_texel(format: ColorFormat, texels: [&[u8]; 4], out: &mut [u8]) {
    match format {
        ColorFormat::R8Uint | ColorFormat::Rg8 | ColorFormat::Rgba8Uint | ColorFormat::Rgba8Float => {
            for c in 0..out.len() {
                let sum: u32 = texels.iter().map(|t| u32::from(t[c])).sum();
                out[c] = (sum / 4) as u8;
            }
        }

        ColorFormat::R16Uint
        | ColorFormat::R16Float
        | ColorFormat::Rg16
        | ColorFormat::Rg16Float
        | ColorFormat::Rgba16Uint
        | ColorFormat::Rgba16Float => {
            for c in 0..out.len() / 2 {
                let sum: u32 = texels
                    .iter()
                    .map(|t| u32::from(u16::from_le_bytes([t[c * 2], t[c * 2 + 1]])))
                    .sum();
                out[c * 2..c * 2 + 2].copy_from_slice(&((sum / 4) as u16).to_le_bytes());
            }
        }

        ColorFormat::R32Float | ColorFormat::Rg32Float | ColorFormat::Rgba32Float => {
            for c in 0..out.len() / 4 {
                let sum: f32 = texels
                    .iter()
                    .map(|t| {
                        f32::from_le_bytes([t[c * 4], t[c * 4 + 1], t[c * 4 + 2], t[c * 4 + 3]])
                    })
                    .sum();
                out[c * 4..c * 4 + 4].copy_from_slice(&(sum * 0.25).to_le_bytes());
            }
        }

        ColorFormat::Rgba32Uint => {
            for c in 0..out.len() / 4 {
                let sum: u64 = texels
                    .iter()
                    .map(|t| {
                        u64::from(u32::from_le_bytes([
                            t[c * 4],
                            t[c * 4 + 1],
                            t[c * 4 + 2],
                            t[c * 4 + 3],
                        ]))
                    })
                    .sum();
                out[c * 4..c * 4 + 4].copy_from_slice(&((sum / 4) as u32).to_le_bytes());
            }
        }

        ColorFormat::Rgb10A2Float => {
            let words = texels.map(|t| unpack_rgb10a2(u32::from_le_bytes([t[0], t[1], t[2], t[3]])));
            let mut avg = [0u32; 4];
            for (c, value) in avg.iter_mut().enumerate() {
                *value = words.iter().map(|w| w[c]).sum::<u32>() / 4;
            }
            out.copy_from_slice(&pack_rgb10a2(avg).to_le_bytes());
        }

        ColorFormat::None => unreachable!("rejected before filtering"),
    }
}

/// Generates the next mip level (half dimensions) of `src` into `dst`.
///
/// `dst` must be exactly `(width / 2) * (height / 2) * bpp` bytes.
pub fn mip_generate_next_2d(
    src: &[u8],
    width: u16,
    height: u16,
    format: ColorFormat,
    dst: &mut [u8],
) -> Result<(), MipError> {
    if format == ColorFormat::None {
        return Err(MipError::InvalidFormat(format));
    }
    if width <= 1 || height <= 1 {
        return Err(MipError::SourceTooSmall { width, height });
    }

    let bpp = format.bytes_per_pixel();
    let width = usize::from(width);
    let height = usize::from(height);
    let mip_width = width / 2;
    let mip_height = height / 2;

    let expected = bpp * mip_width * mip_height;
    if dst.len() != expected {
        return Err(MipError::SizeMismatch {
            expected,
            got: dst.len(),
        });
    }
    let src_expected = bpp * width * height;
    if src.len() < src_expected {
        return Err(MipError::SizeMismatch {
            expected: src_expected,
            got: src.len(),
        });
    }

    for y in 0..mip_height {
        for x in 0..mip_width {
            let sx = x * 2;
            let sy = y * 2;

            let texel = |tx: usize, ty: usize| &src[(ty * width + tx) * bpp..][..bpp];
            let texels = [
                texel(sx, sy),
                texel(sx + 1, sy),
                texel(sx, sy + 1),
                texel(sx + 1, sy + 1),
            ];

            let out = &mut dst[(y * mip_width + x) * bpp..][..bpp];
            filter_texel(format, texels, out);
        }
    }

    Ok(())
}

/// Allocating variant of [`mip_generate_next_2d`].
pub fn mip_generate_next_2d_alloc(
    src: &[u8],
    width: u16,
    height: u16,
    format: ColorFormat,
) -> Result<Vec<u8>, MipError> {
    if format == ColorFormat::None {
        return Err(MipError::InvalidFormat(format));
    }
    if width <= 1 || height <= 1 {
        return Err(MipError::SourceTooSmall { width, height });
    }

    let size = format.bytes_per_pixel() * usize::from(width / 2) * usize::from(height / 2);
    let mut dst = vec![0; size];
    mip_generate_next_2d(src, width, height, format, &mut dst)?;
    Ok(dst)
}

/// Generates the full chain of `src` into `dst`: level 0 copied verbatim,
/// then each generated level feeding the next.
pub fn mip_generate_chain_2d(
    src: &[u8],
    width: u16,
    height: u16,
    format: ColorFormat,
    dst: &mut [u8],
) -> Result<(), MipError> {
    if format == ColorFormat::None {
        return Err(MipError::InvalidFormat(format));
    }
    if width <= 1 || height <= 1 {
        return Err(MipError::SourceTooSmall { width, height });
    }

    let levels = mip_level_count_2d(width, height);
    let bpp = format.bytes_per_pixel();
    let expected = mip_buffer_size_2d(width, height, levels, format)?;
    if dst.len() != expected {
        return Err(MipError::SizeMismatch {
            expected,
            got: dst.len(),
        });
    }

    // Full resolution
    let level0 = bpp * usize::from(width) * usize::from(height);
    dst[..level0].copy_from_slice(&src[..level0]);

    // Generated mips, each reading the level written before it
    let mut src_offset = 0;
    let mut dst_offset = level0;
    let mut w = width;
    let mut h = height;
    for _ in 1..levels {
        let size = bpp * usize::from(w / 2) * usize::from(h / 2);
        let (read, write) = dst.split_at_mut(dst_offset);
        mip_generate_next_2d(&read[src_offset..], w, h, format, &mut write[..size])?;

        src_offset = dst_offset;
        dst_offset += size;
        w /= 2;
        h /= 2;
    }

    Ok(())
}

/// Allocating variant of [`mip_generate_chain_2d`].
pub fn mip_generate_chain_2d_alloc(
    src: &[u8],
    width: u16,
    height: u16,
    format: ColorFormat,
) -> Result<Vec<u8>, MipError> {
    if format == ColorFormat::None {
        return Err(MipError::InvalidFormat(format));
    }
    if width <= 1 || height <= 1 {
        return Err(MipError::SourceTooSmall { width, height });
    }

    let levels = mip_level_count_2d(width, height);
    let size = mip_buffer_size_2d(width, height, levels, format)?;
    let mut dst = vec![0; size];
    mip_generate_chain_2d(src, width, height, format, &mut dst)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::{
        mip_buffer_size_2d, mip_generate_chain_2d_alloc, mip_generate_next_2d,
        mip_generate_next_2d_alloc, mip_level_count_2d, mip_level_validate_2d,
    };
    use crate::format::ColorFormat;

    #[test]
    fn level_counts() {
        assert_eq!(mip_level_count_2d(1, 1), 1);
        assert_eq!(mip_level_count_2d(1, 512), 1);
        assert_eq!(mip_level_count_2d(512, 1), 1);
        assert_eq!(mip_level_count_2d(2, 2), 2);
        assert_eq!(mip_level_count_2d(4, 4), 3);
        assert_eq!(mip_level_count_2d(256, 64), 7);
        assert_eq!(mip_level_count_2d(255, 255), 8);
    }

    #[test]
    fn level_validation() {
        assert!(mip_level_validate_2d(4, 4, 3));
        assert!(!mip_level_validate_2d(4, 4, 4));
        assert!(mip_level_validate_2d(1, 1, 1));
        assert!(mip_level_validate_2d(65535, 65535, 16));
        assert!(!mip_level_validate_2d(65535, 65535, 17));
    }

    #[test]
    fn buffer_sizes() {
        // 4 * (16 + 4 + 1)
        assert_eq!(
            mip_buffer_size_2d(4, 4, 3, ColorFormat::Rgba8Uint).unwrap(),
            84
        );
        assert_eq!(
            mip_buffer_size_2d(8, 8, 1, ColorFormat::R8Uint).unwrap(),
            64
        );
        assert!(mip_buffer_size_2d(4, 4, 3, ColorFormat::None).is_err());
        assert!(mip_buffer_size_2d(4, 4, 9, ColorFormat::Rgba8Uint).is_err());
    }

    #[test]
    fn chain_4x4_rgba8() {
        let src = [100u8; 4 * 4 * 4];
        let chain = mip_generate_chain_2d_alloc(&src, 4, 4, ColorFormat::Rgba8Uint).unwrap();
        assert_eq!(chain.len(), 84);

        // Level 1: 2x2 of (100, 100, 100, 100)
        assert!(chain[64..80].iter().all(|&b| b == 100));
        // Level 2: 1x1
        assert_eq!(&chain[80..], &[100, 100, 100, 100]);
    }

    #[test]
    fn next_level_averages() {
        // 2x2 R8 with distinct values.
        let src = [10u8, 20, 30, 40];
        let mip = mip_generate_next_2d_alloc(&src, 2, 2, ColorFormat::R8Uint).unwrap();
        assert_eq!(mip, vec![25]);
    }

    #[test]
    fn next_level_float() {
        let mut src = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0] {
            src.extend_from_slice(&v.to_le_bytes());
        }
        let mip = mip_generate_next_2d_alloc(&src, 2, 2, ColorFormat::R32Float).unwrap();
        assert_eq!(f32::from_le_bytes(mip[..4].try_into().unwrap()), 2.5);
    }

    #[test]
    fn rgb10a2_repacks() {
        let pack = |r: u32, g: u32, b: u32, a: u32| {
            (r & 0x3FF) | ((g & 0x3FF) << 10) | ((b & 0x3FF) << 20) | ((a & 0x3) << 30)
        };
        let mut src = Vec::new();
        for word in [
            pack(100, 200, 300, 1),
            pack(100, 200, 300, 1),
            pack(100, 200, 300, 3),
            pack(100, 200, 300, 3),
        ] {
            src.extend_from_slice(&word.to_le_bytes());
        }

        let mip = mip_generate_next_2d_alloc(&src, 2, 2, ColorFormat::Rgb10A2Float).unwrap();
        let word = u32::from_le_bytes(mip[..4].try_into().unwrap());
        assert_eq!(word & 0x3FF, 100);
        assert_eq!((word >> 10) & 0x3FF, 200);
        assert_eq!((word >> 20) & 0x3FF, 300);
        assert_eq!((word >> 30) & 0x3, 2);
    }

    #[test]
    fn rejects_small_source() {
        let src = [0u8; 4];
        let mut dst = [0u8; 1];
        assert!(mip_generate_next_2d(&src, 1, 4, ColorFormat::R8Uint, &mut dst).is_err());
        assert!(mip_generate_next_2d(&src, 4, 1, ColorFormat::R8Uint, &mut dst).is_err());
    }

    #[test]
    fn rejects_size_mismatch() {
        let src = [0u8; 16];
        let mut dst = [0u8; 3];
        assert!(mip_generate_next_2d(&src, 4, 4, ColorFormat::R8Uint, &mut dst).is_err());
    }
}
