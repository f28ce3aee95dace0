//! Normalized records emitted to the sink
//!
//! Every record is born during a single parse and either streamed out or
//! dropped; nothing here borrows from the input file. Serialization follows
//! the reference JSON encoding: one object per record, field-name keys,
//! coordinate triples as `{x, y, z}`, grids as flat row-major arrays.

use serde::Serialize;

use crate::format::Format;

/// Vertices per MCNK heightfield: a 9×9 outer grid interleaved with an
/// 8×8 inner grid, stored outer-then-inner.
pub const MCNK_VERTEX_COUNT: usize = 145;

/// Alpha and shadow maps cover 64×64 texels.
pub const MAP_RESOLUTION: usize = 64;

/// Decoded alpha-map size in bytes.
pub const ALPHA_MAP_SIZE: usize = MAP_RESOLUTION * MAP_RESOLUTION;

/// Bit-packed shadow-map size in bytes.
pub const SHADOW_MAP_SIZE: usize = ALPHA_MAP_SIZE / 8;

/// Tiles per world axis.
pub const WORLD_TILE_DIM: usize = 64;

/// MCNKs per tile axis.
pub const TILE_MCNK_DIM: usize = 16;

/// A coordinate triple rendered as `{x, y, z}` in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
        }
    }
}

/// World-level record opening a record stream.
#[derive(Debug, Clone, Serialize)]
pub struct WorldRecord {
    /// Source path or origin label
    pub path: String,
    pub format: Format,
    /// MVER payload value
    pub version: u32,
    /// MPHD flags word
    pub flags: u32,
    /// Observed top-level chunk tag order, for round-trip fidelity
    pub chunk_order: Vec<String>,
}

/// One presence-grid cell that holds (or, for retail, will hold) a tile.
///
/// `offset`/`size` locate the embedded blob in alpha worlds and are zero
/// for retail.
#[derive(Debug, Clone, Serialize)]
pub struct TileRecord {
    pub x: i32,
    pub y: i32,
    pub offset: u32,
    pub size: u32,
    pub flags: u32,
    pub async_id: u32,
}

/// Which model family a name or placement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Small placed model (M2); `MMDX`/`MDNM` names, `MDDF` placements
    Doodad,
    /// Large world object (WMO) with bounds; `MWMO`/`MONM` names, `MODF`
    WorldObject,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Doodad => write!(f, "doodad"),
            Self::WorldObject => write!(f, "world_object"),
        }
    }
}

/// Extra fields carried only by world-object placements.
#[derive(Debug, Clone, Serialize)]
pub struct WorldObjectExtent {
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub doodad_set: u16,
    pub name_set: u16,
}

/// A fully-dereferenced placement entry.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementRecord {
    pub kind: ModelKind,
    /// Index into the model index table as stored on disk
    pub name_id: u32,
    /// Resolved model path, or `"<invalid:N>"` when out of range
    pub name: String,
    /// False when `name_id` did not resolve
    pub resolved: bool,
    pub unique_id: u32,
    pub position: Vec3,
    pub rotation: Vec3,
    /// Logical scale (stored as 16-bit fixed point, divided by 1024)
    pub scale: f32,
    pub flags: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<WorldObjectExtent>,
}

/// MCNK header fields surfaced to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct McnkRecord {
    /// Column within the tile, `0..16`
    pub i: u32,
    /// Row within the tile, `0..16`
    pub j: u32,
    pub flags: u32,
    pub area_id: u32,
    /// Alpha headers pack area_id ambiguously; false marks it untrusted
    pub area_id_reliable: bool,
    pub n_layers: u32,
    pub n_doodad_refs: u32,
    pub n_map_obj_refs: u32,
    pub n_sound_emitters: u32,
    pub holes: u32,
    pub position: Vec3,
    /// Indices into the tile's doodad placement list
    pub doodad_refs: Vec<u32>,
    /// Indices into the tile's world-object placement list
    pub map_object_refs: Vec<u32>,
    /// True when a structural header error suppressed the sub-records
    pub failed: bool,
    /// Sub-chunk errors attached during decode
    pub errors: Vec<String>,
}

/// One texture layer of an MCNK.
#[derive(Debug, Clone, Serialize)]
pub struct LayerRecord {
    /// Layer position within the MCNK, 0 = base
    pub index: u32,
    /// Index into the tile's texture name list
    pub texture_id: u32,
    /// Resolved texture path when `texture_id` is in range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture_name: Option<String>,
    pub flags: u32,
    /// Offset into MCAL (retail; alpha stores none)
    pub alpha_offset: u32,
    pub effect_id: u32,
    /// Whether an alpha map follows this layer
    pub alpha_map_present: bool,
    /// Whether that alpha map is run-length encoded
    pub compressed: bool,
}

/// Modern per-MCNK liquid layer (MH2O).
#[derive(Debug, Clone, Serialize)]
pub struct LiquidLayer {
    pub layer_index: u8,
    pub info_mask: u32,
    pub base_height_level: u32,
    pub fishable: bool,
    pub fatigue: bool,
    /// Vertex grid width, from the info mask
    pub width: u32,
    /// Vertex grid height, from the info mask
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertices: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_flags: Option<Vec<u8>>,
}

/// Liquid attached to one MCNK, in whichever era's encoding the file used.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "liquid_kind", rename_all = "snake_case")]
pub enum LiquidRecord {
    /// Legacy MCLQ block inside the MCNK
    Legacy {
        first_vertex_index: u16,
        n_vertices: u16,
        n_faces: u16,
        flags: u16,
        /// `n_vertices` height triples, flattened
        heights: Vec<f32>,
        /// `n_faces` index triples, flattened
        faces: Vec<u32>,
    },
    /// Modern MH2O layers at the tile level
    Modern { layers: Vec<LiquidLayer> },
}

/// 64×64 tile presence grid.
#[derive(Debug, Clone)]
pub struct TileGrid {
    cells: Box<[bool]>,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            cells: vec![false; WORLD_TILE_DIM * WORLD_TILE_DIM].into_boxed_slice(),
        }
    }
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, x: usize, y: usize, present: bool) {
        if x < WORLD_TILE_DIM && y < WORLD_TILE_DIM {
            self.cells[y * WORLD_TILE_DIM + x] = present;
        }
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        x < WORLD_TILE_DIM && y < WORLD_TILE_DIM && self.cells[y * WORLD_TILE_DIM + x]
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Row-major view of all 4096 cells.
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }
}

/// Unpack a bit-packed 512-byte shadow map into 4096 bytes of 0/1,
/// LSB-first within each byte. Used by sinks that persist the reference
/// JSON encoding, which renders shadow maps at full resolution.
pub fn unpack_shadow_bits(packed: &[u8; SHADOW_MAP_SIZE]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ALPHA_MAP_SIZE);
    for byte in packed {
        for bit in 0..8 {
            out.push((byte >> bit) & 1);
        }
    }
    out
}
