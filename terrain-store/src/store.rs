//! JSON-lines record store
//!
//! The relational-store writer behind the decoder's sink capability: one
//! JSON object per record in `records.jsonl`, keys matching record field
//! names, grids flattened row-major, alpha and shadow maps as length-4096
//! arrays. Missing-asset reports go to a `missing_assets.txt` side file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use wow_terrain::records::{
    LayerRecord, LiquidRecord, MCNK_VERTEX_COUNT, McnkRecord, ModelKind, PlacementRecord,
    SHADOW_MAP_SIZE, TileRecord, WorldRecord, unpack_shadow_bits,
};
use wow_terrain::sink::{LayerId, McnkId, RecordSink, TileId, WorldId};
use wow_terrain::{Result, TerrainError};

/// Sink writing the record stream as JSON lines.
pub struct JsonlStore {
    records: BufWriter<File>,
    missing: BufWriter<File>,
    next_id: u64,
    root: PathBuf,
}

impl JsonlStore {
    /// Record stream file name inside the store directory.
    pub const RECORDS_FILE: &'static str = "records.jsonl";

    /// Missing-asset side stream file name.
    pub const MISSING_FILE: &'static str = "missing_assets.txt";

    /// Create (or truncate) a store in `dir`, creating the directory.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let records = BufWriter::new(File::create(root.join(Self::RECORDS_FILE))?);
        let missing = BufWriter::new(File::create(root.join(Self::MISSING_FILE))?);
        Ok(Self {
            records,
            missing,
            next_id: 0,
            root,
        })
    }

    /// The store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn write(&mut self, value: &Value) -> Result<()> {
        serde_json::to_writer(&mut self.records, value)
            .map_err(|e| TerrainError::Sink(e.to_string()))?;
        self.records
            .write_all(b"\n")
            .map_err(|e| TerrainError::Sink(e.to_string()))?;
        Ok(())
    }

    /// Serialize a record struct and splice in the envelope fields.
    fn tagged<T: serde::Serialize>(record: &T, kind: &str, extra: Value) -> Result<Value> {
        let mut value = serde_json::to_value(record).map_err(|e| TerrainError::Sink(e.to_string()))?;
        let Value::Object(ref mut map) = value else {
            return Err(TerrainError::Sink(format!("{kind} record is not an object")));
        };
        map.insert("record".into(), Value::from(kind));
        if let Value::Object(extra) = extra {
            for (k, v) in extra {
                map.insert(k, v);
            }
        }
        Ok(value)
    }
}

impl RecordSink for JsonlStore {
    fn begin_world(&mut self, world: &WorldRecord) -> Result<WorldId> {
        let id = WorldId(self.next());
        let value = Self::tagged(world, "world", json!({ "id": id.0 }))?;
        self.write(&value)?;
        Ok(id)
    }

    fn add_tile(&mut self, world: WorldId, tile: &TileRecord) -> Result<TileId> {
        let id = TileId(self.next());
        let value = Self::tagged(tile, "tile", json!({ "id": id.0, "world": world.0 }))?;
        self.write(&value)?;
        Ok(id)
    }

    fn add_texture(&mut self, world: WorldId, tile: TileId, index: u32, name: &str) -> Result<()> {
        self.write(&json!({
            "record": "texture",
            "world": world.0,
            "tile": tile.0,
            "index": index,
            "name": name,
        }))
    }

    fn add_model(
        &mut self,
        world: WorldId,
        tile: TileId,
        kind: ModelKind,
        index: u32,
        name: &str,
    ) -> Result<()> {
        self.write(&json!({
            "record": "model",
            "world": world.0,
            "tile": tile.0,
            "kind": kind.to_string(),
            "index": index,
            "name": name,
        }))
    }

    fn add_placement(
        &mut self,
        world: WorldId,
        tile: TileId,
        placement: &PlacementRecord,
    ) -> Result<()> {
        let value = Self::tagged(
            placement,
            "placement",
            json!({ "world": world.0, "tile": tile.0 }),
        )?;
        self.write(&value)
    }

    fn add_mcnk(&mut self, tile: TileId, mcnk: &McnkRecord) -> Result<McnkId> {
        let id = McnkId(self.next());
        let value = Self::tagged(mcnk, "mcnk", json!({ "id": id.0, "tile": tile.0 }))?;
        self.write(&value)?;
        Ok(id)
    }

    fn add_heights(&mut self, mcnk: McnkId, heights: &[f32; MCNK_VERTEX_COUNT]) -> Result<()> {
        self.write(&json!({
            "record": "heights",
            "mcnk": mcnk.0,
            "values": heights[..].to_vec(),
        }))
    }

    fn add_normals(&mut self, mcnk: McnkId, normals: &[[f32; 3]; MCNK_VERTEX_COUNT]) -> Result<()> {
        let flat: Vec<f32> = normals.iter().flatten().copied().collect();
        self.write(&json!({
            "record": "normals",
            "mcnk": mcnk.0,
            "values": flat,
        }))
    }

    fn add_layer(&mut self, mcnk: McnkId, layer: &LayerRecord) -> Result<LayerId> {
        let id = LayerId(self.next());
        let value = Self::tagged(layer, "layer", json!({ "id": id.0, "mcnk": mcnk.0 }))?;
        self.write(&value)?;
        Ok(id)
    }

    fn add_alpha_map(&mut self, layer: LayerId, data: &[u8; 4096]) -> Result<()> {
        self.write(&json!({
            "record": "alpha_map",
            "layer": layer.0,
            "data": data[..].to_vec(),
        }))
    }

    fn add_shadow_map(&mut self, mcnk: McnkId, data: &[u8; SHADOW_MAP_SIZE]) -> Result<()> {
        self.write(&json!({
            "record": "shadow_map",
            "mcnk": mcnk.0,
            "bits": unpack_shadow_bits(data),
        }))
    }

    fn add_vertex_colors(
        &mut self,
        mcnk: McnkId,
        colors: &[[u8; 4]; MCNK_VERTEX_COUNT],
    ) -> Result<()> {
        let flat: Vec<u8> = colors.iter().flatten().copied().collect();
        self.write(&json!({
            "record": "vertex_colors",
            "mcnk": mcnk.0,
            "values": flat,
        }))
    }

    fn add_liquid(&mut self, mcnk: McnkId, liquid: &LiquidRecord) -> Result<()> {
        let value = Self::tagged(liquid, "liquid", json!({ "mcnk": mcnk.0 }))?;
        self.write(&value)
    }

    fn add_missing_asset(&mut self, _world: WorldId, name: &str, referenced_by: &str) -> Result<()> {
        writeln!(self.missing, "{name}\t{referenced_by}")
            .map_err(|e| TerrainError::Sink(e.to_string()))
    }

    fn end_world(&mut self, world: WorldId, cancelled: bool) -> Result<()> {
        self.write(&json!({
            "record": "end_world",
            "world": world.0,
            "cancelled": cancelled,
        }))?;
        self.records
            .flush()
            .map_err(|e| TerrainError::Sink(e.to_string()))?;
        self.missing
            .flush()
            .map_err(|e| TerrainError::Sink(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wow_terrain::Format;

    #[test]
    fn records_land_as_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonlStore::create(dir.path()).expect("store");

        let world = store
            .begin_world(&WorldRecord {
                path: "x.wdt".into(),
                format: Format::Retail,
                version: 18,
                flags: 0,
                chunk_order: vec!["MVER".into()],
            })
            .expect("world");
        let tile = store
            .add_tile(
                world,
                &TileRecord {
                    x: 1,
                    y: 2,
                    offset: 0,
                    size: 0,
                    flags: 1,
                    async_id: 0,
                },
            )
            .expect("tile");
        store
            .add_texture(world, tile, 0, "tileset/grass.blp")
            .expect("texture");
        store.end_world(world, false).expect("end");
        drop(store);

        let content =
            fs::read_to_string(dir.path().join(JsonlStore::RECORDS_FILE)).expect("read store");
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).expect("valid json"))
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["record"], "world");
        assert_eq!(lines[0]["format"], "retail");
        assert_eq!(lines[1]["record"], "tile");
        assert_eq!(lines[1]["x"], 1);
        assert_eq!(lines[2]["name"], "tileset/grass.blp");
        assert_eq!(lines[3]["record"], "end_world");
        assert_eq!(lines[3]["cancelled"], false);
    }

    #[test]
    fn shadow_maps_unpack_to_4096_bits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonlStore::create(dir.path()).expect("store");
        let mut packed = [0u8; SHADOW_MAP_SIZE];
        packed[0] = 0b0000_0011;
        store.add_shadow_map(McnkId(1), &packed).expect("shadow");
        drop(store);

        let content =
            fs::read_to_string(dir.path().join(JsonlStore::RECORDS_FILE)).expect("read store");
        let value: Value = serde_json::from_str(content.trim()).expect("json");
        let bits = value["bits"].as_array().expect("bits array");
        assert_eq!(bits.len(), 4096);
        assert_eq!(bits[0], 1);
        assert_eq!(bits[1], 1);
        assert_eq!(bits[2], 0);
    }

    #[test]
    fn missing_assets_go_to_the_side_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonlStore::create(dir.path()).expect("store");
        store
            .add_missing_asset(WorldId(1), "world/tree.m2", "tile (5, 7)")
            .expect("missing");
        store.end_world(WorldId(1), false).expect("end");
        drop(store);

        let content =
            fs::read_to_string(dir.path().join(JsonlStore::MISSING_FILE)).expect("read missing");
        assert_eq!(content, "world/tree.m2\ttile (5, 7)\n");
    }
}
