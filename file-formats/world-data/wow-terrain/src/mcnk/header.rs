//! MCNK fixed headers
//!
//! Retail payloads start with a 128-byte header whose offset fields locate
//! the sub-chunks; alpha payloads start with a 16-byte header and lay their
//! sub-chunks out in a fixed order at computable offsets.

use bitflags::bitflags;

use crate::error::{Result, TerrainError};
use crate::reader::ByteReader;
use crate::records::MCNK_VERTEX_COUNT;

/// Retail MCNK header size.
pub const RETAIL_HEADER_SIZE: usize = 128;

/// Alpha MCNK header size.
pub const ALPHA_HEADER_SIZE: usize = 16;

/// Heightfield payload size: 145 × f32.
pub const MCVT_SIZE: usize = MCNK_VERTEX_COUNT * 4;

/// Normals payload: 145 × 3 × i8; retail appends a 13-byte pad.
pub const MCNR_SIZE: usize = MCNK_VERTEX_COUNT * 3;
pub const MCNR_PADDED_SIZE: usize = MCNR_SIZE + 13;

/// Vertex-color payload size: 145 × 4 bytes.
pub const MCCV_SIZE: usize = MCNK_VERTEX_COUNT * 4;

/// Texture layer entry sizes per era.
pub const MCLY_ENTRY_SIZE_RETAIL: usize = 16;
pub const MCLY_ENTRY_SIZE_ALPHA: usize = 8;

/// Alpha-era shadow maps occupy 64 bytes on disk (padded to the full
/// 512-byte bit array on decode).
pub const ALPHA_SHADOW_SIZE: usize = 64;

bitflags! {
    /// MCNK header flags interpreted by the decoder. The rest of the word
    /// is carried through to the record untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct McnkFlags: u32 {
        /// A shadow map is present (selects the alpha-era trailer)
        const HAS_SHADOW            = 0x0001;
        /// Chunk is impassable; carried, not interpreted
        const IMPASS                = 0x0002;
        /// Legacy liquid kinds
        const LIQUID_RIVER          = 0x0004;
        const LIQUID_OCEAN          = 0x0008;
        const LIQUID_MAGMA          = 0x0010;
        const LIQUID_SLIME          = 0x0020;
        /// Vertex colors are present (selects the alpha-era trailer)
        const HAS_VERTEX_COLORS     = 0x0040;
        /// The encoder replicated the last alpha/shadow row and column;
        /// decode must re-apply the replication
        const DO_NOT_FIX_ALPHA_MAP  = 0x8000;
    }
}

impl McnkFlags {
    /// Any of the legacy liquid kind bits.
    pub fn has_liquid(self) -> bool {
        self.intersects(
            Self::LIQUID_RIVER | Self::LIQUID_OCEAN | Self::LIQUID_MAGMA | Self::LIQUID_SLIME,
        )
    }
}

/// The 128-byte retail MCNK header, fields at their on-disk offsets.
#[derive(Debug, Clone)]
pub struct RetailHeader {
    pub flags: u32,
    pub index_x: u32,
    pub index_y: u32,
    pub n_layers: u32,
    pub n_doodad_refs: u32,
    pub ofs_heights: u32,
    pub ofs_normals: u32,
    pub ofs_layers: u32,
    pub ofs_refs: u32,
    pub ofs_alpha: u32,
    pub size_alpha: u32,
    pub ofs_shadow: u32,
    pub size_shadow: u32,
    pub area_id: u32,
    pub n_map_obj_refs: u32,
    pub holes: u32,
    /// Bytes 64..88: layer texture ids, effect doodads and friends;
    /// carried through without interpretation
    pub assorted: [u8; 24],
    pub ofs_sound_emitters: u32,
    pub n_sound_emitters: u32,
    pub ofs_liquid: u32,
    pub size_liquid: u32,
    pub position: [f32; 3],
    pub ofs_vertex_colors: u32,
    pub ofs_light_values: u32,
    pub reserved: u32,
}

impl RetailHeader {
    /// Parse the fixed header from the start of an MCNK payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < RETAIL_HEADER_SIZE {
            return Err(TerrainError::Truncated {
                offset: 0,
                wanted: RETAIL_HEADER_SIZE,
                available: payload.len(),
            });
        }
        let r = ByteReader::new(payload);
        let mut assorted = [0u8; 24];
        assorted.copy_from_slice(r.bytes(64, 24)?);
        Ok(Self {
            flags: r.read_u32(0)?,
            index_x: r.read_u32(4)?,
            index_y: r.read_u32(8)?,
            n_layers: r.read_u32(12)?,
            n_doodad_refs: r.read_u32(16)?,
            ofs_heights: r.read_u32(20)?,
            ofs_normals: r.read_u32(24)?,
            ofs_layers: r.read_u32(28)?,
            ofs_refs: r.read_u32(32)?,
            ofs_alpha: r.read_u32(36)?,
            size_alpha: r.read_u32(40)?,
            ofs_shadow: r.read_u32(44)?,
            size_shadow: r.read_u32(48)?,
            area_id: r.read_u32(52)?,
            n_map_obj_refs: r.read_u32(56)?,
            holes: r.read_u32(60)?,
            assorted,
            ofs_sound_emitters: r.read_u32(88)?,
            n_sound_emitters: r.read_u32(92)?,
            ofs_liquid: r.read_u32(96)?,
            size_liquid: r.read_u32(100)?,
            position: r.read_vec3(104)?,
            ofs_vertex_colors: r.read_u32(116)?,
            ofs_light_values: r.read_u32(120)?,
            reserved: r.read_u32(124)?,
        })
    }

    pub fn flag_bits(&self) -> McnkFlags {
        McnkFlags::from_bits_truncate(self.flags)
    }
}

/// The 16-byte alpha MCNK header.
///
/// The area_id word is packed ambiguously by alpha-era encoders; records
/// built from this header carry `area_id_reliable = false`.
#[derive(Debug, Clone)]
pub struct AlphaHeader {
    pub flags: u32,
    pub area_id: u32,
    pub n_layers: u32,
    pub n_doodad_refs: u32,
}

impl AlphaHeader {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < ALPHA_HEADER_SIZE {
            return Err(TerrainError::Truncated {
                offset: 0,
                wanted: ALPHA_HEADER_SIZE,
                available: payload.len(),
            });
        }
        let r = ByteReader::new(payload);
        Ok(Self {
            flags: r.read_u32(0)?,
            area_id: r.read_u32(4)?,
            n_layers: r.read_u32(8)?,
            n_doodad_refs: r.read_u32(12)?,
        })
    }

    pub fn flag_bits(&self) -> McnkFlags {
        McnkFlags::from_bits_truncate(self.flags)
    }

    /// Computed sub-chunk layout: heights right after the header, layers
    /// after the heights, doodad refs after the layers, then the optional
    /// trailers (shadow, vertex colors, liquid) selected by flags.
    pub fn layout(&self) -> AlphaLayout {
        let ofs_heights = ALPHA_HEADER_SIZE;
        let ofs_layers = ofs_heights + MCVT_SIZE;
        let ofs_refs = ofs_layers + self.n_layers as usize * MCLY_ENTRY_SIZE_ALPHA;
        let mut cursor = ofs_refs + self.n_doodad_refs as usize * 4;

        let flags = self.flag_bits();
        let ofs_shadow = if flags.contains(McnkFlags::HAS_SHADOW) {
            let ofs = cursor;
            cursor += ALPHA_SHADOW_SIZE;
            Some(ofs)
        } else {
            None
        };
        let ofs_vertex_colors = if flags.contains(McnkFlags::HAS_VERTEX_COLORS) {
            let ofs = cursor;
            cursor += MCCV_SIZE;
            Some(ofs)
        } else {
            None
        };
        let ofs_liquid = if flags.has_liquid() { Some(cursor) } else { None };

        AlphaLayout {
            ofs_heights,
            ofs_layers,
            ofs_refs,
            ofs_shadow,
            ofs_vertex_colors,
            ofs_liquid,
        }
    }
}

/// Byte offsets of an alpha MCNK's sub-chunks within its payload.
#[derive(Debug, Clone, Copy)]
pub struct AlphaLayout {
    pub ofs_heights: usize,
    pub ofs_layers: usize,
    pub ofs_refs: usize,
    pub ofs_shadow: Option<usize>,
    pub ofs_vertex_colors: Option<usize>,
    pub ofs_liquid: Option<usize>,
}
