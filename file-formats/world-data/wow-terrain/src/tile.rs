//! Tile decoder shell
//!
//! Parses a tile's non-terrain chunks (texture and model name tables,
//! placement tables, the MH2O water table) and drives the MCNK decoder
//! over the up-to-256 terrain sub-tiles, emitting records in row-major
//! order. Works the same whether the tile is a standalone retail file or
//! an embedded view inside an alpha world.

use crate::chunk_id::ChunkId;
use crate::error::Result;
use crate::format::Format;
use crate::listfile;
use crate::mcnk::{self, DecodedMcnk, McnkInputs};
use crate::options::ParseOptions;
use crate::reader::ByteReader;
use crate::records::{
    ModelKind, PlacementRecord, TILE_MCNK_DIM, Vec3, WorldObjectExtent,
};
use crate::resolver::{ModelTable, NameTable, UidTracker};
use crate::scanner::ScannedFile;
use crate::sink::{RecordSink, TileId, WorldId};

/// MDDF entry size.
const DOODAD_PLACEMENT_SIZE: usize = 36;

/// MODF entry size.
const OBJECT_PLACEMENT_SIZE: usize = 64;

/// Fixed-point divisor for placement scale.
const SCALE_DIVISOR: f32 = 1024.0;

/// Everything a tile decode needs from its surroundings.
pub(crate) struct TileInputs<'a> {
    pub format: Format,
    /// MPHD flags of the owning world (0 when parsed standalone)
    pub world_flags: u32,
    pub world: WorldId,
    pub tile: TileId,
    /// Label used in logs and missing-asset records, e.g. `tile (5,7)`
    pub label: String,
    /// World-level tables, consulted when the tile has none of its own
    /// (alpha worlds keep names and textures at world scope)
    pub world_doodads: Option<&'a ModelTable>,
    pub world_objects: Option<&'a ModelTable>,
    pub world_textures: Option<&'a [String]>,
    pub options: &'a ParseOptions,
}

/// Per-tile outcome counters, merged into the world summary.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TileStats {
    pub mcnks: usize,
    pub failed_mcnks: usize,
    pub placements: usize,
    pub warnings: usize,
    pub missing_assets: usize,
    pub cancelled: bool,
}

/// Decode one scanned tile and stream its records.
pub(crate) fn decode_tile<S: RecordSink>(
    scanned: &ScannedFile<'_>,
    inputs: &TileInputs<'_>,
    uid: &mut UidTracker,
    sink: &mut S,
) -> Result<TileStats> {
    let mut stats = TileStats::default();

    check_hint_chunks(scanned, inputs, &mut stats);

    // Asset tables first; placements and layers reference them.
    let textures = tile_textures(scanned, inputs, &mut stats, sink)?;
    let (doodads, objects) = tile_model_tables(scanned, inputs, &mut stats, sink)?;

    emit_placements(scanned, inputs, &doodads, &objects, uid, &mut stats, sink)?;

    let mh2o = match scanned.first_payload(ChunkId::MH2O) {
        Some(Ok(payload)) => Some(payload),
        Some(Err(err)) => {
            log::warn!("{}: unreadable MH2O chunk: {err}", inputs.label);
            stats.warnings += 1;
            None
        }
        None => None,
    };

    decode_mcnks(scanned, inputs, &textures, mh2o, &mut stats, sink)?;

    Ok(stats)
}

/// MHDR and MCIN are offset hints; the scanner already found everything,
/// so they are only validated and logged.
fn check_hint_chunks(scanned: &ScannedFile<'_>, inputs: &TileInputs<'_>, stats: &mut TileStats) {
    if let Some(loc) = scanned.first(ChunkId::MHDR) {
        if loc.size != 64 {
            log::warn!("{}: MHDR is {} bytes, expected 64", inputs.label, loc.size);
            stats.warnings += 1;
        }
    }
    if let Some(loc) = scanned.first(ChunkId::MCIN) {
        if loc.size != 4096 {
            log::warn!("{}: MCIN is {} bytes, expected 4096", inputs.label, loc.size);
            stats.warnings += 1;
        } else if let Some(Ok(payload)) = scanned.first_payload(ChunkId::MCIN) {
            let r = ByteReader::new(payload);
            let referenced = (0..TILE_MCNK_DIM * TILE_MCNK_DIM)
                .filter(|&k| r.read_u32(k * 16).ok().is_some_and(|o| o > 0))
                .count();
            log::debug!("{}: MCIN references {referenced} MCNKs", inputs.label);
        }
    }
}

/// Ordered texture names; emitted as records and cross-checked against the
/// listfile. Alpha embedded tiles fall back to the world's MTEX.
fn tile_textures<S: RecordSink>(
    scanned: &ScannedFile<'_>,
    inputs: &TileInputs<'_>,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<Vec<String>> {
    let own: Option<Vec<String>> = match scanned.first_payload(ChunkId::MTEX) {
        Some(Ok(payload)) => Some(
            NameTable::from_block(payload)
                .iter()
                .map(|(_, name)| name.to_string())
                .collect(),
        ),
        Some(Err(err)) => {
            log::warn!("{}: unreadable MTEX chunk: {err}", inputs.label);
            stats.warnings += 1;
            None
        }
        None => None,
    };

    let textures = match own {
        Some(names) => names,
        None => inputs
            .world_textures
            .map(<[String]>::to_vec)
            .unwrap_or_default(),
    };

    for (index, name) in textures.iter().enumerate() {
        sink.add_texture(inputs.world, inputs.tile, index as u32, name)?;
        check_asset(name, inputs, stats, sink)?;
    }
    Ok(textures)
}

/// Model name/index tables for both kinds. Retail joins MMDX+MMID and
/// MWMO+MWID; alpha reads MDNM/MONM and synthesizes the index arrays.
fn tile_model_tables<S: RecordSink>(
    scanned: &ScannedFile<'_>,
    inputs: &TileInputs<'_>,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<(ModelTable, ModelTable)> {
    let (doodad_names, doodad_indices, object_names, object_indices) = match inputs.format {
        Format::Retail => (
            ChunkId::MMDX,
            Some(ChunkId::MMID),
            ChunkId::MWMO,
            Some(ChunkId::MWID),
        ),
        Format::Alpha => (ChunkId::MDNM, None, ChunkId::MONM, None),
    };

    let doodads = build_model_table(scanned, doodad_names, doodad_indices, inputs, stats)?;
    let objects = build_model_table(scanned, object_names, object_indices, inputs, stats)?;

    for (kind, table) in [(ModelKind::Doodad, &doodads), (ModelKind::WorldObject, &objects)] {
        if let Some(table) = table {
            for (index, (_, name)) in table.names.iter().enumerate() {
                sink.add_model(inputs.world, inputs.tile, kind, index as u32, name)?;
                check_asset(name, inputs, stats, sink)?;
            }
        }
    }

    // Tiles without their own tables resolve through the world's.
    let doodads = doodads
        .or_else(|| inputs.world_doodads.cloned())
        .unwrap_or_default();
    let objects = objects
        .or_else(|| inputs.world_objects.cloned())
        .unwrap_or_default();
    Ok((doodads, objects))
}

fn build_model_table(
    scanned: &ScannedFile<'_>,
    names_tag: ChunkId,
    indices_tag: Option<ChunkId>,
    inputs: &TileInputs<'_>,
    stats: &mut TileStats,
) -> Result<Option<ModelTable>> {
    let names = match scanned.first_payload(names_tag) {
        Some(Ok(payload)) => NameTable::from_block(payload),
        Some(Err(err)) => {
            log::warn!("{}: unreadable {names_tag} chunk: {err}", inputs.label);
            stats.warnings += 1;
            return Ok(None);
        }
        None => return Ok(None),
    };

    let indices = match indices_tag {
        Some(tag) => match scanned.first_payload(tag) {
            Some(Ok(payload)) => {
                let r = ByteReader::new(payload);
                let count = payload.len() / 4;
                let mut offsets = Vec::with_capacity(count);
                for i in 0..count {
                    offsets.push(r.read_u32(i * 4)?);
                }
                Some(offsets)
            }
            Some(Err(err)) => {
                log::warn!("{}: unreadable {tag} chunk: {err}", inputs.label);
                stats.warnings += 1;
                None
            }
            None => None,
        },
        None => None,
    };

    Ok(Some(ModelTable::new(names, indices)))
}

fn check_asset<S: RecordSink>(
    name: &str,
    inputs: &TileInputs<'_>,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<()> {
    if let Some(listfile) = inputs.options.listfile.as_deref() {
        if !listfile::is_known(listfile, name) {
            log::debug!(
                "{}",
                crate::error::TerrainError::AssetMissing {
                    name: name.to_string(),
                    referenced_by: inputs.label.clone(),
                }
            );
            sink.add_missing_asset(inputs.world, name, &inputs.label)?;
            stats.missing_assets += 1;
        }
    }
    Ok(())
}

/// Parse and emit MDDF then MODF placements, resolving names and feeding
/// the unique-id tracker.
pub(crate) fn emit_placements<S: RecordSink>(
    scanned: &ScannedFile<'_>,
    inputs: &TileInputs<'_>,
    doodads: &ModelTable,
    objects: &ModelTable,
    uid: &mut UidTracker,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<()> {
    if let Some(Ok(payload)) = scanned.first_payload(ChunkId::MDDF) {
        emit_doodad_payload(payload, inputs, doodads, uid, stats, sink)?;
    }
    if let Some(Ok(payload)) = scanned.first_payload(ChunkId::MODF) {
        emit_object_payload(payload, inputs, objects, uid, stats, sink)?;
    }
    Ok(())
}

/// World-level MDDF/MODF for WMO-only worlds and alpha world scope; only
/// chunks outside the embedded-tile byte ranges belong to the world.
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_world_scope_placements<S: RecordSink>(
    scanned: &ScannedFile<'_>,
    ranges: &[(usize, usize)],
    inputs: &TileInputs<'_>,
    doodads: &ModelTable,
    objects: &ModelTable,
    uid: &mut UidTracker,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<()> {
    let outside = |tag: ChunkId| {
        scanned
            .all(tag)
            .iter()
            .find(|loc| {
                !ranges
                    .iter()
                    .any(|&(start, end)| loc.offset >= start && loc.offset < end)
            })
            .and_then(|loc| scanned.payload(*loc).ok())
    };
    if let Some(payload) = outside(ChunkId::MDDF) {
        emit_doodad_payload(payload, inputs, doodads, uid, stats, sink)?;
    }
    if let Some(payload) = outside(ChunkId::MODF) {
        emit_object_payload(payload, inputs, objects, uid, stats, sink)?;
    }
    Ok(())
}

fn emit_doodad_payload<S: RecordSink>(
    payload: &[u8],
    inputs: &TileInputs<'_>,
    doodads: &ModelTable,
    uid: &mut UidTracker,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<()> {
    for record in parse_doodad_placements(payload, &inputs.label, stats)? {
        let resolved = doodads.resolve(record.name_id);
        if !resolved.resolved {
            log::warn!(
                "{}: doodad placement {} cites unknown name index {}",
                inputs.label,
                record.unique_id,
                record.name_id
            );
            stats.warnings += 1;
        }
        uid.observe(record.unique_id);
        stats.placements += 1;
        sink.add_placement(
            inputs.world,
            inputs.tile,
            &PlacementRecord {
                kind: ModelKind::Doodad,
                name_id: record.name_id,
                name: resolved.name,
                resolved: resolved.resolved,
                unique_id: record.unique_id,
                position: record.position,
                rotation: record.rotation,
                scale: record.scale,
                flags: record.flags,
                extent: None,
            },
        )?;
    }
    Ok(())
}

fn emit_object_payload<S: RecordSink>(
    payload: &[u8],
    inputs: &TileInputs<'_>,
    objects: &ModelTable,
    uid: &mut UidTracker,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<()> {
    for record in parse_object_placements(payload, &inputs.label, stats)? {
        let resolved = objects.resolve(record.placement.name_id);
        if !resolved.resolved {
            log::warn!(
                "{}: world-object placement {} cites unknown name index {}",
                inputs.label,
                record.placement.unique_id,
                record.placement.name_id
            );
            stats.warnings += 1;
        }
        uid.observe(record.placement.unique_id);
        stats.placements += 1;
        sink.add_placement(
            inputs.world,
            inputs.tile,
            &PlacementRecord {
                kind: ModelKind::WorldObject,
                name_id: record.placement.name_id,
                name: resolved.name,
                resolved: resolved.resolved,
                unique_id: record.placement.unique_id,
                position: record.placement.position,
                rotation: record.placement.rotation,
                scale: record.placement.scale,
                flags: record.placement.flags,
                extent: Some(record.extent),
            },
        )?;
    }
    Ok(())
}

struct RawPlacement {
    name_id: u32,
    unique_id: u32,
    position: Vec3,
    rotation: Vec3,
    scale: f32,
    flags: u16,
}

struct RawObjectPlacement {
    placement: RawPlacement,
    extent: WorldObjectExtent,
}

/// MDDF: 36-byte entries `{name_id, unique_id, pos, rot, scale:u16, flags:u16}`.
fn parse_doodad_placements(
    payload: &[u8],
    label: &str,
    stats: &mut TileStats,
) -> Result<Vec<RawPlacement>> {
    if payload.len() % DOODAD_PLACEMENT_SIZE != 0 {
        log::warn!(
            "{label}: MDDF size {} is not a multiple of {DOODAD_PLACEMENT_SIZE}",
            payload.len()
        );
        stats.warnings += 1;
    }
    let r = ByteReader::new(payload);
    let count = payload.len() / DOODAD_PLACEMENT_SIZE;
    let mut placements = Vec::with_capacity(count);
    for n in 0..count {
        let base = n * DOODAD_PLACEMENT_SIZE;
        placements.push(RawPlacement {
            name_id: r.read_u32(base)?,
            unique_id: r.read_u32(base + 4)?,
            position: r.read_vec3(base + 8)?.into(),
            rotation: r.read_vec3(base + 20)?.into(),
            scale: f32::from(r.read_u16(base + 32)?) / SCALE_DIVISOR,
            flags: r.read_u16(base + 34)?,
        });
    }
    Ok(placements)
}

/// MODF: 64-byte entries; the MDDF prefix plus bounds and set ids, with
/// the scale word at the record tail.
fn parse_object_placements(
    payload: &[u8],
    label: &str,
    stats: &mut TileStats,
) -> Result<Vec<RawObjectPlacement>> {
    if payload.len() % OBJECT_PLACEMENT_SIZE != 0 {
        log::warn!(
            "{label}: MODF size {} is not a multiple of {OBJECT_PLACEMENT_SIZE}",
            payload.len()
        );
        stats.warnings += 1;
    }
    let r = ByteReader::new(payload);
    let count = payload.len() / OBJECT_PLACEMENT_SIZE;
    let mut placements = Vec::with_capacity(count);
    for n in 0..count {
        let base = n * OBJECT_PLACEMENT_SIZE;
        placements.push(RawObjectPlacement {
            placement: RawPlacement {
                name_id: r.read_u32(base)?,
                unique_id: r.read_u32(base + 4)?,
                position: r.read_vec3(base + 8)?.into(),
                rotation: r.read_vec3(base + 20)?.into(),
                scale: f32::from(r.read_u16(base + 62)?) / SCALE_DIVISOR,
                flags: r.read_u16(base + 56)?,
            },
            extent: WorldObjectExtent {
                bounds_min: r.read_vec3(base + 32)?.into(),
                bounds_max: r.read_vec3(base + 44)?.into(),
                doodad_set: r.read_u16(base + 58)?,
                name_set: r.read_u16(base + 60)?,
            },
        });
    }
    Ok(placements)
}

/// Decode every MCNK and emit them in row-major (j-outer, i-inner) order.
fn decode_mcnks<S: RecordSink>(
    scanned: &ScannedFile<'_>,
    inputs: &TileInputs<'_>,
    textures: &[String],
    mh2o: Option<&[u8]>,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<()> {
    let locators = scanned.all(ChunkId::MCNK);
    if locators.is_empty() {
        return Ok(());
    }
    if locators.len() > TILE_MCNK_DIM * TILE_MCNK_DIM {
        log::warn!(
            "{}: {} MCNK chunks, expected at most 256",
            inputs.label,
            locators.len()
        );
        stats.warnings += 1;
    }

    let mcnk_inputs = McnkInputs {
        format: inputs.format,
        orientation: scanned.orientation,
        world_flags: inputs.world_flags,
        mh2o,
        texture_names: textures,
        options: inputs.options,
    };

    let mut grid: Vec<Option<DecodedMcnk>> = Vec::new();
    grid.resize_with(TILE_MCNK_DIM * TILE_MCNK_DIM, || None);
    let mut strays: Vec<DecodedMcnk> = Vec::new();

    for (file_index, locator) in locators.iter().enumerate() {
        if inputs.options.is_cancelled() {
            stats.cancelled = true;
            break;
        }
        let payload = match scanned.payload(*locator) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("{}: unreadable MCNK payload: {err}", inputs.label);
                stats.warnings += 1;
                continue;
            }
        };
        let decoded = mcnk::decode(payload, file_index, &mcnk_inputs);
        let (i, j) = (decoded.record.i as usize, decoded.record.j as usize);
        if i < TILE_MCNK_DIM && j < TILE_MCNK_DIM {
            let slot = &mut grid[j * TILE_MCNK_DIM + i];
            if slot.is_some() {
                log::warn!(
                    "{}: duplicate MCNK at ({i}, {j}), keeping the first",
                    inputs.label
                );
                stats.warnings += 1;
            } else {
                *slot = Some(decoded);
            }
        } else {
            strays.push(decoded);
        }
    }

    for decoded in grid.into_iter().flatten() {
        emit_mcnk(decoded, inputs, stats, sink)?;
    }
    for decoded in strays {
        emit_mcnk(decoded, inputs, stats, sink)?;
    }

    Ok(())
}

/// Stream one decoded MCNK in the mandated sub-record order. Failed MCNKs
/// contribute the bare record only.
pub(crate) fn emit_mcnk<S: RecordSink>(
    decoded: DecodedMcnk,
    inputs: &TileInputs<'_>,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<()> {
    stats.mcnks += 1;
    stats.warnings += decoded.record.errors.len();
    if decoded.record.failed {
        stats.failed_mcnks += 1;
    }

    let mcnk_id = sink.add_mcnk(inputs.tile, &decoded.record)?;
    if decoded.record.failed {
        return Ok(());
    }

    if let Some(heights) = decoded.heights.as_deref() {
        sink.add_heights(mcnk_id, heights)?;
    }
    if let Some(normals) = decoded.normals.as_deref() {
        sink.add_normals(mcnk_id, normals)?;
    }
    for (layer, alpha) in &decoded.layers {
        let layer_id = sink.add_layer(mcnk_id, layer)?;
        if let Some(alpha) = alpha.as_deref() {
            sink.add_alpha_map(layer_id, alpha)?;
        }
    }
    if let Some(shadow) = decoded.shadow.as_ref() {
        sink.add_shadow_map(mcnk_id, &shadow.data)?;
    }
    if let Some(colors) = decoded.vertex_colors.as_deref() {
        sink.add_vertex_colors(mcnk_id, colors)?;
    }
    if let Some(liquid) = decoded.liquid.as_ref() {
        sink.add_liquid(mcnk_id, liquid)?;
    }
    Ok(())
}

/// Parse `(x, y)` out of a `Map_x_y.adt` style file stem.
pub fn tile_coords_from_name(stem: &str) -> Option<(i32, i32)> {
    let mut parts = stem.rsplitn(3, '_');
    let y: i32 = parts.next()?.parse().ok()?;
    let x: i32 = parts.next()?.parse().ok()?;
    parts.next()?;
    Some((x, y))
}
