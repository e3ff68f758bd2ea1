//! Guillotine atlas packing.
//!
//! Free space is tracked as a list of rectangles. Each placement removes
//! the chosen space and splits the remainder with one horizontal and one
//! vertical cut. Glyphs are placed largest first; the atlas starts at
//! 32x32 and doubles until everything fits or the 4096 cap is hit.

use thiserror::Error;

pub const ATLAS_SIZE_MIN: u16 = 32;
pub const ATLAS_SIZE_MAX: u16 = 4096;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("glyphs exceeded max atlas resolution {max}x{max}", max = ATLAS_SIZE_MAX)]
    Overflow,
}

/// Where a glyph ended up inside the atlas.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Placement {
    pub x1: u16,
    pub y1: u16,
    pub x2: u16,
    pub y2: u16,
    /// Normalized coordinates in u16 fixed point, 65535 == 1.0.
    pub u1: u16,
    pub v1: u16,
    pub u2: u16,
    pub v2: u16,
}

#[derive(Copy, Clone, Debug)]
struct Space {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl Space {
    fn area(&self) -> u32 {
        self.w * self.h
    }
}

/// Maps an atlas coordinate to u16 fixed point.
///
/// The product is 65536 when the coordinate touches the atlas edge, one
/// past `u16::MAX`; clamping maps the edge to the last representable
/// texel instead of wrapping to 0.
fn to_uv(coord: u16, size: u16) -> u16 {
    let uv = (f32::from(coord) / f32::from(size) * 65536.0) as u32;
    uv.min(65535) as u16
}

/// Packs `sizes` (glyph pixel dimensions) into a square power-of-two
/// atlas with `padding` texels around every glyph.
///
/// Returns the atlas size and one [`Placement`] per input, in input
/// order. Output is fully deterministic for identical input.
pub fn pack(sizes: &[(u16, u16)], padding: u16) -> Result<(u16, Vec<Placement>), AtlasError> {
    let pad = u32::from(padding);

    // Largest first; ties broken by input order so the result is stable.
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_unstable_by_key(|&i| {
        (
            std::cmp::Reverse(u32::from(sizes[i].0) + u32::from(sizes[i].1)),
            i,
        )
    });

    let mut size = ATLAS_SIZE_MIN;
    'grow: loop {
        let mut placements = vec![Placement::default(); sizes.len()];
        let mut spaces = vec![Space {
            x: 0,
            y: 0,
            w: u32::from(size),
            h: u32::from(size),
        }];

        for &glyph in &order {
            let (glyph_w, glyph_h) = (u32::from(sizes[glyph].0), u32::from(sizes[glyph].1));

            // Scan back to front: smaller spaces live at the back.
            let mut found = None;
            for i in (0..spaces.len()).rev() {
                if spaces[i].w >= glyph_w + pad * 2 && spaces[i].h >= glyph_h + pad * 2 {
                    found = Some(i);
                    break;
                }
            }

            let Some(index) = found else {
                // Retry with doubled size.
                if size >= ATLAS_SIZE_MAX {
                    return Err(AtlasError::Overflow);
                }
                size *= 2;
                continue 'grow;
            };

            let space = spaces[index];
            let x1 = (space.x + pad) as u16;
            let y1 = (space.y + pad) as u16;
            let x2 = x1 + glyph_w as u16;
            let y2 = y1 + glyph_h as u16;
            placements[glyph] = Placement {
                x1,
                y1,
                x2,
                y2,
                u1: to_uv(x1, size),
                v1: to_uv(y1, size),
                u2: to_uv(x2, size),
                v2: to_uv(y2, size),
            };

            let h_split = Space {
                x: space.x,
                y: space.y + glyph_h + pad * 2,
                w: space.w,
                h: space.h - glyph_h - pad * 2,
            };
            let v_split = Space {
                x: space.x + glyph_w + pad * 2,
                y: space.y,
                w: space.w - glyph_w - pad * 2,
                h: glyph_h + pad * 2,
            };

            spaces.swap_remove(index);

            if h_split.area() == 0 && v_split.area() == 0 {
                continue;
            } else if h_split.area() == 0 {
                spaces.push(v_split);
            } else if v_split.area() == 0 {
                spaces.push(h_split);
            } else if h_split.area() > v_split.area() {
                // Bigger split first: it lands earlier in the list and is
                // therefore considered last by the back-to-front scan.
                spaces.push(h_split);
                spaces.push(v_split);
            } else {
                spaces.push(v_split);
                spaces.push(h_split);
            }
        }

        return Ok((size, placements));
    }
}

#[cfg(test)]
mod tests {
    use super::{pack, Placement};

    fn overlaps(a: &Placement, b: &Placement, pad: u16) -> bool {
        let ax1 = a.x1.saturating_sub(pad);
        let ay1 = a.y1.saturating_sub(pad);
        let bx1 = b.x1.saturating_sub(pad);
        let by1 = b.y1.saturating_sub(pad);
        ax1 < b.x2 + pad && bx1 < a.x2 + pad && ay1 < b.y2 + pad && by1 < a.y2 + pad
    }

    #[test]
    fn exact_fit() {
        // 30x30 plus one texel of padding on each side is exactly 32x32.
        let (size, placements) = pack(&[(30, 30)], 1).unwrap();
        assert_eq!(size, 32);
        assert_eq!(placements[0].x1, 1);
        assert_eq!(placements[0].y1, 1);
        assert_eq!(placements[0].x2, 31);
        assert_eq!(placements[0].y2, 31);
    }

    #[test]
    fn smoke() {
        let (size, placements) = pack(&[(30, 30), (20, 20), (10, 10)], 1).unwrap();
        // The 30x30 glyph alone consumes all of a 32 atlas, so the set
        // doubles once.
        assert_eq!(size, 64);

        // Largest glyph goes in first at the padded origin.
        assert_eq!(placements[0].x1, 1);
        assert_eq!(placements[0].y1, 1);
        assert_eq!(placements[0].x2, 31);
        assert_eq!(placements[0].y2, 31);

        for p in &placements {
            assert!(p.x2 <= size && p.y2 <= size);
        }
        for (i, a) in placements.iter().enumerate() {
            for b in &placements[i + 1..] {
                assert!(!overlaps(a, b, 1), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn grows_to_fit() {
        // Each 30x30 glyph occupies a 32x32 guillotine cell; four fill a
        // 64 atlas, a fifth forces another doubling.
        let (size, _) = pack(&[(30, 30); 4], 1).unwrap();
        assert_eq!(size, 64);

        let (size, placements) = pack(&[(30, 30); 5], 1).unwrap();
        assert_eq!(size, 128);

        for (i, a) in placements.iter().enumerate() {
            for b in &placements[i + 1..] {
                assert!(!overlaps(a, b, 1), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(pack(&[(5000, 5000)], 1).is_err());
        assert!(pack(&[(2048, 2048); 8], 1).is_err());
    }

    #[test]
    fn uv_edges_clamp() {
        // A single glyph filling the whole atlas (minus padding) has its
        // far edge at the atlas boundary.
        let (size, placements) = pack(&[(30, 30)], 1).unwrap();
        assert_eq!(size, 32);
        let p = placements[0];
        assert_eq!(p.u1, (1.0 / 32.0 * 65536.0) as u16);
        assert_eq!(p.u2, (31.0 / 32.0 * 65536.0) as u16);
    }

    #[test]
    fn deterministic() {
        let sizes = [(12, 20), (20, 12), (8, 8), (16, 16), (4, 4)];
        let a = pack(&sizes, 1).unwrap();
        let b = pack(&sizes, 1).unwrap();
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }
}
