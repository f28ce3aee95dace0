//! Fixed-layout MCNK sub-chunk decoders
//!
//! These operate on exact payload views carved out by the traversal in
//! [`super`]; none of them seek or peek tags themselves.

use crate::error::{Result, TerrainError};
use crate::reader::ByteReader;
use crate::records::MCNK_VERTEX_COUNT;

use super::header::{MCLY_ENTRY_SIZE_ALPHA, MCLY_ENTRY_SIZE_RETAIL, MCNR_SIZE, MCVT_SIZE};

/// One MCLY entry, normalized across eras. Alpha entries carry only the
/// texture id and flags; offset and effect id stay zero.
#[derive(Debug, Clone, Copy)]
pub struct RawLayer {
    pub texture_id: u32,
    pub flags: u32,
    pub alpha_offset: u32,
    pub effect_id: u32,
}

/// MCVT: exactly 145 little-endian f32 heights, outer grid then inner.
pub fn parse_heights(data: &[u8]) -> Result<Box<[f32; MCNK_VERTEX_COUNT]>> {
    if data.len() < MCVT_SIZE {
        return Err(TerrainError::Truncated {
            offset: 0,
            wanted: MCVT_SIZE,
            available: data.len(),
        });
    }
    let r = ByteReader::new(data);
    let mut heights = Box::new([0.0f32; MCNK_VERTEX_COUNT]);
    for (i, h) in heights.iter_mut().enumerate() {
        *h = r.read_f32(i * 4)?;
    }
    Ok(heights)
}

/// MCNR: 145 signed-byte triples; each component maps to `[-1, 1]` via
/// division by 127. Retail appends a 13-byte pad which is ignored.
pub fn parse_normals(data: &[u8]) -> Result<Box<[[f32; 3]; MCNK_VERTEX_COUNT]>> {
    if data.len() < MCNR_SIZE {
        return Err(TerrainError::Truncated {
            offset: 0,
            wanted: MCNR_SIZE,
            available: data.len(),
        });
    }
    let mut normals = Box::new([[0.0f32; 3]; MCNK_VERTEX_COUNT]);
    for (i, normal) in normals.iter_mut().enumerate() {
        for (j, component) in normal.iter_mut().enumerate() {
            *component = (data[i * 3 + j] as i8) as f32 / 127.0;
        }
    }
    Ok(normals)
}

/// Retail MCLY: 16-byte entries `{texture_id, flags, alpha_offset, effect_id}`.
pub fn parse_layers_retail(data: &[u8], n_layers: usize) -> Result<Vec<RawLayer>> {
    let needed = n_layers * MCLY_ENTRY_SIZE_RETAIL;
    if data.len() < needed {
        return Err(TerrainError::Truncated {
            offset: 0,
            wanted: needed,
            available: data.len(),
        });
    }
    let r = ByteReader::new(data);
    let mut layers = Vec::with_capacity(n_layers);
    for i in 0..n_layers {
        let base = i * MCLY_ENTRY_SIZE_RETAIL;
        layers.push(RawLayer {
            texture_id: r.read_u32(base)?,
            flags: r.read_u32(base + 4)?,
            alpha_offset: r.read_u32(base + 8)?,
            effect_id: r.read_u32(base + 12)?,
        });
    }
    Ok(layers)
}

/// Alpha MCLY: 8-byte entries `{texture_id, flags}`.
pub fn parse_layers_alpha(data: &[u8], n_layers: usize) -> Result<Vec<RawLayer>> {
    let needed = n_layers * MCLY_ENTRY_SIZE_ALPHA;
    if data.len() < needed {
        return Err(TerrainError::Truncated {
            offset: 0,
            wanted: needed,
            available: data.len(),
        });
    }
    let r = ByteReader::new(data);
    let mut layers = Vec::with_capacity(n_layers);
    for i in 0..n_layers {
        let base = i * MCLY_ENTRY_SIZE_ALPHA;
        layers.push(RawLayer {
            texture_id: r.read_u32(base)?,
            flags: r.read_u32(base + 4)?,
            alpha_offset: 0,
            effect_id: 0,
        });
    }
    Ok(layers)
}

/// MCRF: `count` u32 indices into the tile's placement lists.
pub fn parse_refs(data: &[u8], count: usize) -> Result<Vec<u32>> {
    let needed = count * 4;
    if data.len() < needed {
        return Err(TerrainError::Truncated {
            offset: 0,
            wanted: needed,
            available: data.len(),
        });
    }
    let r = ByteReader::new(data);
    (0..count).map(|i| r.read_u32(i * 4)).collect()
}

/// MCCV: 145 vertex colors, stored BGRA, emitted RGBA.
pub fn parse_vertex_colors(data: &[u8]) -> Result<Box<[[u8; 4]; MCNK_VERTEX_COUNT]>> {
    let needed = MCNK_VERTEX_COUNT * 4;
    if data.len() < needed {
        return Err(TerrainError::Truncated {
            offset: 0,
            wanted: needed,
            available: data.len(),
        });
    }
    let mut colors = Box::new([[0u8; 4]; MCNK_VERTEX_COUNT]);
    for (i, color) in colors.iter_mut().enumerate() {
        let base = i * 4;
        let [b, g, r, a] = [data[base], data[base + 1], data[base + 2], data[base + 3]];
        *color = [r, g, b, a];
    }
    Ok(colors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn heights_decode_exactly_145() {
        let mut data = Vec::new();
        for i in 0..MCNK_VERTEX_COUNT {
            data.extend_from_slice(&(i as f32).to_le_bytes());
        }
        let heights = parse_heights(&data).unwrap();
        assert_eq!(heights.len(), 145);
        assert_eq!(heights[0], 0.0);
        assert_eq!(heights[144], 144.0);
    }

    #[test]
    fn short_heights_are_truncated() {
        assert!(matches!(
            parse_heights(&[0u8; 100]),
            Err(TerrainError::Truncated { .. })
        ));
    }

    #[test]
    fn normals_divide_by_127() {
        let mut data = vec![0u8; MCNR_SIZE];
        data[0] = 127; // x of vertex 0
        data[1] = 0x81; // -127 as i8
        data[2] = 0;
        let normals = parse_normals(&data).unwrap();
        assert_eq!(normals[0][0], 1.0);
        assert_eq!(normals[0][1], -1.0);
        assert_eq!(normals[0][2], 0.0);
    }

    #[test]
    fn normals_ignore_retail_pad() {
        let mut data = vec![0u8; MCNR_SIZE + 13];
        data[MCNR_SIZE] = 0xFF; // pad bytes are not normals
        let normals = parse_normals(&data).unwrap();
        assert_eq!(normals[144], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn retail_layers_read_all_four_words() {
        let mut data = Vec::new();
        for (tex, flags, ofs, effect) in [(0u32, 0u32, 0u32, 0u32), (1, 0x300, 2048, 7)] {
            data.extend_from_slice(&tex.to_le_bytes());
            data.extend_from_slice(&flags.to_le_bytes());
            data.extend_from_slice(&ofs.to_le_bytes());
            data.extend_from_slice(&effect.to_le_bytes());
        }
        let layers = parse_layers_retail(&data, 2).unwrap();
        assert_eq!(layers[1].texture_id, 1);
        assert_eq!(layers[1].flags, 0x300);
        assert_eq!(layers[1].alpha_offset, 2048);
        assert_eq!(layers[1].effect_id, 7);
    }

    #[test]
    fn alpha_layers_are_two_words() {
        let mut data = Vec::new();
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&0x100u32.to_le_bytes());
        let layers = parse_layers_alpha(&data, 1).unwrap();
        assert_eq!(layers[0].texture_id, 3);
        assert_eq!(layers[0].flags, 0x100);
        assert_eq!(layers[0].alpha_offset, 0);
    }

    #[test]
    fn vertex_colors_swap_bgra_to_rgba() {
        let mut data = vec![0u8; MCNK_VERTEX_COUNT * 4];
        data[0] = 0x10; // b
        data[1] = 0x20; // g
        data[2] = 0x30; // r
        data[3] = 0x40; // a
        let colors = parse_vertex_colors(&data).unwrap();
        assert_eq!(colors[0], [0x30, 0x20, 0x10, 0x40]);
    }

    #[test]
    fn refs_parse_count_entries() {
        let mut data = Vec::new();
        for i in [10u32, 20, 30] {
            data.extend_from_slice(&i.to_le_bytes());
        }
        assert_eq!(parse_refs(&data, 3).unwrap(), vec![10, 20, 30]);
        assert!(parse_refs(&data, 4).is_err());
    }
}
