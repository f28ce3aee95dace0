//! Liquid decoding: legacy MCLQ blocks and modern MH2O layers
//!
//! A tile stores water either the old way (an MCLQ block inside each wet
//! MCNK) or the new way (one MH2O chunk at the tile level holding a
//! 256-entry table of per-MCNK layer blocks). When a file carries both for
//! the same coordinate, MH2O wins.

use crate::error::{Result, TerrainError};
use crate::reader::ByteReader;
use crate::records::{LiquidLayer, LiquidRecord};

/// Layer headers per MH2O block.
pub const MH2O_MAX_LAYERS: usize = 8;

/// Bytes per MH2O layer header.
const MH2O_LAYER_HEADER_SIZE: usize = 16;

/// Bytes per MH2O per-MCNK block (8 layer headers).
pub const MH2O_BLOCK_SIZE: usize = MH2O_MAX_LAYERS * MH2O_LAYER_HEADER_SIZE;

/// MCLQ fixed header size.
const MCLQ_HEADER_SIZE: usize = 8;

/// Parse a legacy MCLQ block: `{first_vertex_index, n_vertices, n_faces,
/// flags}` as u16s, then `n_vertices` height triples, then `n_faces` index
/// triples.
pub fn parse_mclq(data: &[u8]) -> Result<LiquidRecord> {
    let r = ByteReader::new(data);
    if data.len() < MCLQ_HEADER_SIZE {
        return Err(TerrainError::Truncated {
            offset: 0,
            wanted: MCLQ_HEADER_SIZE,
            available: data.len(),
        });
    }
    let first_vertex_index = r.read_u16(0)?;
    let n_vertices = r.read_u16(2)?;
    let n_faces = r.read_u16(4)?;
    let flags = r.read_u16(6)?;

    let mut heights = Vec::with_capacity(n_vertices as usize * 3);
    let mut offset = MCLQ_HEADER_SIZE;
    for _ in 0..n_vertices {
        let v = r.read_vec3(offset)?;
        heights.extend_from_slice(&v);
        offset += 12;
    }

    let mut faces = Vec::with_capacity(n_faces as usize * 3);
    for _ in 0..n_faces {
        faces.push(r.read_u32(offset)?);
        faces.push(r.read_u32(offset + 4)?);
        faces.push(r.read_u32(offset + 8)?);
        offset += 12;
    }

    Ok(LiquidRecord::Legacy {
        first_vertex_index,
        n_vertices,
        n_faces,
        flags,
        heights,
        faces,
    })
}

/// Parse the MH2O block for MCNK index `k` (`j * 16 + i`, row-major) out of
/// the tile-level MH2O payload. Returns `None` when the block is past the
/// payload end or holds no layers.
pub fn parse_mh2o_block(payload: &[u8], k: usize) -> Result<Option<LiquidRecord>> {
    let block_start = k * MH2O_BLOCK_SIZE;
    if block_start + MH2O_BLOCK_SIZE > payload.len() {
        return Ok(None);
    }
    let r = ByteReader::new(payload);
    let mut layers = Vec::new();

    for layer_index in 0..MH2O_MAX_LAYERS {
        let base = block_start + layer_index * MH2O_LAYER_HEADER_SIZE;
        let info_mask = r.read_u32(base)?;
        if info_mask == 0 {
            continue;
        }
        let base_height_level = r.read_u32(base + 4)?;
        let offset_vertex = r.read_u32(base + 8)?;
        let offset_render = r.read_u32(base + 12)?;

        let has_vertices = info_mask & 0x1 != 0;
        let has_render_flags = info_mask & 0x2 != 0;
        let fishable = info_mask & 0x4 != 0;
        let fatigue = info_mask & 0x8 != 0;
        let width = ((info_mask >> 16) & 0xFF) + 1;
        let height = ((info_mask >> 24) & 0xFF) + 1;
        let cells = (width * height) as usize;

        let vertices = if has_vertices {
            let mut heights = Vec::with_capacity(cells);
            for n in 0..cells {
                heights.push(r.read_f32(offset_vertex as usize + n * 4)?);
            }
            Some(heights)
        } else {
            None
        };

        let render_flags = if has_render_flags {
            Some(r.bytes(offset_render as usize, cells)?.to_vec())
        } else {
            None
        };

        layers.push(LiquidLayer {
            layer_index: layer_index as u8,
            info_mask,
            base_height_level,
            fishable,
            fatigue,
            width,
            height,
            vertices,
            render_flags,
        });
    }

    if layers.is_empty() {
        Ok(None)
    } else {
        Ok(Some(LiquidRecord::Modern { layers }))
    }
}
