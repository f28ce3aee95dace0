//! Record sink capability
//!
//! The decoder emits typed records through this trait in a fixed total
//! order: world record, tiles in row-major order, then per tile asset
//! tables, placements, and MCNKs in row-major order; within an MCNK,
//! header, heights, normals, layers, alpha, shadow, vertex colors, liquid.
//! Implementations may persist, stream, or discard; calls are synchronous
//! and failures surface as `TerrainError::Sink`.

use serde::Serialize;

use crate::error::Result;
use crate::records::{
    LayerRecord, LiquidRecord, MCNK_VERTEX_COUNT, McnkRecord, ModelKind, PlacementRecord,
    SHADOW_MAP_SIZE, TileRecord, WorldRecord,
};

/// Handle for a world record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WorldId(pub u64);

/// Handle for a tile within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileId(pub u64);

/// Handle for an MCNK within a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct McnkId(pub u64);

/// Handle for a texture layer within an MCNK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LayerId(pub u64);

/// Consumer of the normalized record stream.
pub trait RecordSink {
    fn begin_world(&mut self, world: &WorldRecord) -> Result<WorldId>;

    fn add_tile(&mut self, world: WorldId, tile: &TileRecord) -> Result<TileId>;

    fn add_texture(&mut self, world: WorldId, tile: TileId, index: u32, name: &str) -> Result<()>;

    fn add_model(
        &mut self,
        world: WorldId,
        tile: TileId,
        kind: ModelKind,
        index: u32,
        name: &str,
    ) -> Result<()>;

    fn add_placement(
        &mut self,
        world: WorldId,
        tile: TileId,
        placement: &PlacementRecord,
    ) -> Result<()>;

    fn add_mcnk(&mut self, tile: TileId, mcnk: &McnkRecord) -> Result<McnkId>;

    fn add_heights(&mut self, mcnk: McnkId, heights: &[f32; MCNK_VERTEX_COUNT]) -> Result<()>;

    fn add_normals(&mut self, mcnk: McnkId, normals: &[[f32; 3]; MCNK_VERTEX_COUNT]) -> Result<()>;

    fn add_layer(&mut self, mcnk: McnkId, layer: &LayerRecord) -> Result<LayerId>;

    fn add_alpha_map(&mut self, layer: LayerId, data: &[u8; 4096]) -> Result<()>;

    fn add_shadow_map(&mut self, mcnk: McnkId, data: &[u8; SHADOW_MAP_SIZE]) -> Result<()>;

    fn add_vertex_colors(
        &mut self,
        mcnk: McnkId,
        colors: &[[u8; 4]; MCNK_VERTEX_COUNT],
    ) -> Result<()>;

    fn add_liquid(&mut self, mcnk: McnkId, liquid: &LiquidRecord) -> Result<()>;

    /// Informational side stream for listfile misses.
    fn add_missing_asset(&mut self, world: WorldId, name: &str, referenced_by: &str) -> Result<()>;

    /// Closes the stream; `cancelled` marks a cooperative abort.
    fn end_world(&mut self, world: WorldId, cancelled: bool) -> Result<()>;
}

/// Sink that discards everything; useful for validation-only runs.
#[derive(Debug, Default)]
pub struct NullSink {
    next_id: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl RecordSink for NullSink {
    fn begin_world(&mut self, _world: &WorldRecord) -> Result<WorldId> {
        Ok(WorldId(self.next()))
    }

    fn add_tile(&mut self, _world: WorldId, _tile: &TileRecord) -> Result<TileId> {
        Ok(TileId(self.next()))
    }

    fn add_texture(
        &mut self,
        _world: WorldId,
        _tile: TileId,
        _index: u32,
        _name: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn add_model(
        &mut self,
        _world: WorldId,
        _tile: TileId,
        _kind: ModelKind,
        _index: u32,
        _name: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn add_placement(
        &mut self,
        _world: WorldId,
        _tile: TileId,
        _placement: &PlacementRecord,
    ) -> Result<()> {
        Ok(())
    }

    fn add_mcnk(&mut self, _tile: TileId, _mcnk: &McnkRecord) -> Result<McnkId> {
        Ok(McnkId(self.next()))
    }

    fn add_heights(&mut self, _mcnk: McnkId, _heights: &[f32; MCNK_VERTEX_COUNT]) -> Result<()> {
        Ok(())
    }

    fn add_normals(
        &mut self,
        _mcnk: McnkId,
        _normals: &[[f32; 3]; MCNK_VERTEX_COUNT],
    ) -> Result<()> {
        Ok(())
    }

    fn add_layer(&mut self, _mcnk: McnkId, _layer: &LayerRecord) -> Result<LayerId> {
        Ok(LayerId(self.next()))
    }

    fn add_alpha_map(&mut self, _layer: LayerId, _data: &[u8; 4096]) -> Result<()> {
        Ok(())
    }

    fn add_shadow_map(&mut self, _mcnk: McnkId, _data: &[u8; SHADOW_MAP_SIZE]) -> Result<()> {
        Ok(())
    }

    fn add_vertex_colors(
        &mut self,
        _mcnk: McnkId,
        _colors: &[[u8; 4]; MCNK_VERTEX_COUNT],
    ) -> Result<()> {
        Ok(())
    }

    fn add_liquid(&mut self, _mcnk: McnkId, _liquid: &LiquidRecord) -> Result<()> {
        Ok(())
    }

    fn add_missing_asset(
        &mut self,
        _world: WorldId,
        _name: &str,
        _referenced_by: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn end_world(&mut self, _world: WorldId, _cancelled: bool) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink that keeps every record; the test workhorse.
#[derive(Debug, Default)]
pub struct MemorySink {
    next_id: u64,
    pub worlds: Vec<WorldRecord>,
    pub tiles: Vec<(WorldId, TileId, TileRecord)>,
    pub textures: Vec<(TileId, u32, String)>,
    pub models: Vec<(TileId, ModelKind, u32, String)>,
    pub placements: Vec<(TileId, PlacementRecord)>,
    pub mcnks: Vec<(TileId, McnkId, McnkRecord)>,
    pub heights: Vec<(McnkId, Vec<f32>)>,
    pub normals: Vec<(McnkId, Vec<[f32; 3]>)>,
    pub layers: Vec<(McnkId, LayerId, LayerRecord)>,
    pub alpha_maps: Vec<(LayerId, Vec<u8>)>,
    pub shadow_maps: Vec<(McnkId, Vec<u8>)>,
    pub vertex_colors: Vec<(McnkId, Vec<[u8; 4]>)>,
    pub liquids: Vec<(McnkId, LiquidRecord)>,
    pub missing_assets: Vec<(String, String)>,
    pub ended: Vec<(WorldId, bool)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// MCNK records of one tile, in emission order.
    pub fn mcnks_of(&self, tile: TileId) -> Vec<&McnkRecord> {
        self.mcnks
            .iter()
            .filter(|(t, _, _)| *t == tile)
            .map(|(_, _, r)| r)
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn begin_world(&mut self, world: &WorldRecord) -> Result<WorldId> {
        self.worlds.push(world.clone());
        Ok(WorldId(self.next()))
    }

    fn add_tile(&mut self, world: WorldId, tile: &TileRecord) -> Result<TileId> {
        let id = TileId(self.next());
        self.tiles.push((world, id, tile.clone()));
        Ok(id)
    }

    fn add_texture(&mut self, _world: WorldId, tile: TileId, index: u32, name: &str) -> Result<()> {
        self.textures.push((tile, index, name.to_string()));
        Ok(())
    }

    fn add_model(
        &mut self,
        _world: WorldId,
        tile: TileId,
        kind: ModelKind,
        index: u32,
        name: &str,
    ) -> Result<()> {
        self.models.push((tile, kind, index, name.to_string()));
        Ok(())
    }

    fn add_placement(
        &mut self,
        _world: WorldId,
        tile: TileId,
        placement: &PlacementRecord,
    ) -> Result<()> {
        self.placements.push((tile, placement.clone()));
        Ok(())
    }

    fn add_mcnk(&mut self, tile: TileId, mcnk: &McnkRecord) -> Result<McnkId> {
        let id = McnkId(self.next());
        self.mcnks.push((tile, id, mcnk.clone()));
        Ok(id)
    }

    fn add_heights(&mut self, mcnk: McnkId, heights: &[f32; MCNK_VERTEX_COUNT]) -> Result<()> {
        self.heights.push((mcnk, heights.to_vec()));
        Ok(())
    }

    fn add_normals(&mut self, mcnk: McnkId, normals: &[[f32; 3]; MCNK_VERTEX_COUNT]) -> Result<()> {
        self.normals.push((mcnk, normals.to_vec()));
        Ok(())
    }

    fn add_layer(&mut self, mcnk: McnkId, layer: &LayerRecord) -> Result<LayerId> {
        let id = LayerId(self.next());
        self.layers.push((mcnk, id, layer.clone()));
        Ok(id)
    }

    fn add_alpha_map(&mut self, layer: LayerId, data: &[u8; 4096]) -> Result<()> {
        self.alpha_maps.push((layer, data.to_vec()));
        Ok(())
    }

    fn add_shadow_map(&mut self, mcnk: McnkId, data: &[u8; SHADOW_MAP_SIZE]) -> Result<()> {
        self.shadow_maps.push((mcnk, data.to_vec()));
        Ok(())
    }

    fn add_vertex_colors(
        &mut self,
        mcnk: McnkId,
        colors: &[[u8; 4]; MCNK_VERTEX_COUNT],
    ) -> Result<()> {
        self.vertex_colors.push((mcnk, colors.to_vec()));
        Ok(())
    }

    fn add_liquid(&mut self, mcnk: McnkId, liquid: &LiquidRecord) -> Result<()> {
        self.liquids.push((mcnk, liquid.clone()));
        Ok(())
    }

    fn add_missing_asset(&mut self, _world: WorldId, name: &str, referenced_by: &str) -> Result<()> {
        self.missing_assets
            .push((name.to_string(), referenced_by.to_string()));
        Ok(())
    }

    fn end_world(&mut self, world: WorldId, cancelled: bool) -> Result<()> {
        self.ended.push((world, cancelled));
        Ok(())
    }
}
