//! World-table decoder
//!
//! Parses the top-level world file in a fixed phase order: file structure
//! (MVER, MPHD), the 64×64 tile presence grid (MAIN), global asset tables,
//! and finally, for alpha worlds, the embedded tile blobs, dispatched to
//! the tile decoder as standalone views. Retail worlds keep their tiles in
//! separate files; WMO-only retail worlds carry their placements directly
//! at world level.

use bitflags::bitflags;

use crate::chunk_id::ChunkId;
use crate::error::Result;
use crate::format::{Container, Detection, Format};
use crate::mcnk::{self, McnkInputs};
use crate::options::ParseOptions;
use crate::reader::ByteReader;
use crate::records::{TileGrid, TileRecord, WORLD_TILE_DIM, WorldRecord};
use crate::resolver::{ModelTable, NameTable, UidTracker};
use crate::scanner::{ChunkLocator, ScannedFile};
use crate::sink::RecordSink;
use crate::tile::{self, TileInputs, TileStats};

bitflags! {
    /// MPHD flag bits the decoder interprets; everything else is carried
    /// through on the world record untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MphdFlags: u32 {
        /// The world is a single world-model map with no terrain tiles
        const WMO_ONLY          = 0x01;
        /// Alpha maps are stored at full 8-bit resolution
        const USE_BIG_ALPHA     = 0x04;
        /// Height texturing, also selects full-resolution alpha storage
        const HEIGHT_TEXTURING  = 0x80;
    }
}

/// Retail MAIN cells are `{flags, async_id}`.
const MAIN_CELL_SIZE_RETAIL: usize = 8;

/// Alpha MAIN cells are `{offset, size, flags, async_id}`.
const MAIN_CELL_SIZE_ALPHA: usize = 16;

/// Outcome of one parse, returned alongside the record stream.
#[derive(Debug, Clone)]
pub struct ParseSummary {
    pub path: String,
    pub container: Container,
    pub format: Format,
    pub version: u32,
    pub flags: u32,
    /// Presence cells set in the MAIN grid (or tiles parsed, for
    /// standalone/directory input)
    pub tiles_present: usize,
    pub presence: TileGrid,
    pub mcnks: usize,
    pub failed_mcnks: usize,
    pub placements: usize,
    pub max_unique_id: Option<u32>,
    pub warnings: usize,
    pub missing_assets: usize,
    pub cancelled: bool,
}

impl ParseSummary {
    fn new(origin: &str, detection: Detection) -> Self {
        Self {
            path: origin.to_string(),
            container: detection.container,
            format: detection.format,
            version: 0,
            flags: 0,
            tiles_present: 0,
            presence: TileGrid::new(),
            mcnks: 0,
            failed_mcnks: 0,
            placements: 0,
            max_unique_id: None,
            warnings: 0,
            missing_assets: 0,
            cancelled: false,
        }
    }

    fn absorb(&mut self, stats: TileStats) {
        self.mcnks += stats.mcnks;
        self.failed_mcnks += stats.failed_mcnks;
        self.placements += stats.placements;
        self.warnings += stats.warnings;
        self.missing_assets += stats.missing_assets;
        self.cancelled |= stats.cancelled;
    }
}

/// One present MAIN cell awaiting tile decode.
struct PresentCell {
    x: usize,
    y: usize,
    record: TileRecord,
}

/// Decode a scanned world table, streaming records to the sink.
pub(crate) fn decode_world<S: RecordSink>(
    scanned: &ScannedFile<'_>,
    detection: Detection,
    origin: &str,
    options: &ParseOptions,
    sink: &mut S,
) -> Result<ParseSummary> {
    let mut summary = ParseSummary::new(origin, detection);
    let format = detection.format;

    // Phase 1: file structure
    summary.version = read_version(scanned, origin, &mut summary);
    summary.flags = read_world_flags(scanned, origin, &mut summary);
    summary.warnings += scanned.unknown_chunks;
    if scanned.orientation_defaulted {
        summary.warnings += 1;
    }

    let world_id = sink.begin_world(&WorldRecord {
        path: origin.to_string(),
        format,
        version: summary.version,
        flags: summary.flags,
        chunk_order: scanned.tag_order(),
    })?;

    // Phase 2: tile grid
    let cells = parse_main_grid(scanned, format, origin, &mut summary);
    let embedded_ranges: Vec<(usize, usize)> = cells
        .iter()
        .filter(|c| c.record.size > 0)
        .map(|c| {
            let start = c.record.offset as usize;
            (start, start.saturating_add(c.record.size as usize))
        })
        .collect();

    // Phase 3: global asset tables
    let (world_doodads, world_objects) =
        world_model_tables(scanned, format, &embedded_ranges);
    let world_textures = first_payload_outside(scanned, ChunkId::MTEX, &embedded_ranges)
        .map(|payload| {
            NameTable::from_block(payload)
                .iter()
                .map(|(_, name)| name.to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut uid = UidTracker::new();

    // World-scoped records (global names, direct placements, stray MCNKs)
    // hang off a synthetic (-1, -1) tile.
    let mut synthetic_tile = None;
    let needs_synthetic = !world_doodads.is_empty()
        || !world_objects.is_empty()
        || first_payload_outside(scanned, ChunkId::MDDF, &embedded_ranges).is_some()
        || first_payload_outside(scanned, ChunkId::MODF, &embedded_ranges).is_some()
        || (format == Format::Alpha
            && !chunks_outside(scanned, ChunkId::MCNK, &embedded_ranges).is_empty());
    if needs_synthetic {
        let tile_id = sink.add_tile(
            world_id,
            &TileRecord {
                x: -1,
                y: -1,
                offset: 0,
                size: 0,
                flags: 0,
                async_id: 0,
            },
        )?;
        synthetic_tile = Some(tile_id);

        let inputs = TileInputs {
            format,
            world_flags: summary.flags,
            world: world_id,
            tile: tile_id,
            label: format!("{origin} (world scope)"),
            world_doodads: None,
            world_objects: None,
            world_textures: None,
            options,
        };

        let mut stats = TileStats::default();
        for (kind, table) in [
            (crate::records::ModelKind::Doodad, &world_doodads),
            (crate::records::ModelKind::WorldObject, &world_objects),
        ] {
            for (index, (_, name)) in table.names.iter().enumerate() {
                sink.add_model(world_id, tile_id, kind, index as u32, name)?;
                if let Some(listfile) = options.listfile.as_deref() {
                    if !crate::listfile::is_known(listfile, name) {
                        sink.add_missing_asset(world_id, name, &inputs.label)?;
                        stats.missing_assets += 1;
                    }
                }
            }
        }

        emit_world_placements(
            scanned,
            &embedded_ranges,
            &inputs,
            &world_doodads,
            &world_objects,
            &mut uid,
            &mut stats,
            sink,
        )?;
        summary.absorb(stats);
    }

    // Emit present tiles in row-major order, then (phase 4, alpha only)
    // decode their embedded payloads.
    for cell in &cells {
        let tile_id = sink.add_tile(world_id, &cell.record)?;

        if format == Format::Alpha && cell.record.size > 0 {
            if options.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let start = cell.record.offset as usize;
            let view = match scanned.reader().bytes(start, cell.record.size as usize) {
                Ok(view) => view,
                Err(err) => {
                    log::warn!(
                        "{origin}: embedded tile ({}, {}) escapes the file: {err}",
                        cell.x,
                        cell.y
                    );
                    summary.warnings += 1;
                    continue;
                }
            };
            let tile_scan = match ScannedFile::scan_with_orientation(
                view,
                scanned.orientation,
                scanned.orientation_defaulted,
            ) {
                Ok(tile_scan) => tile_scan,
                Err(err) => {
                    log::warn!(
                        "{origin}: embedded tile ({}, {}) failed to scan: {err}",
                        cell.x,
                        cell.y
                    );
                    summary.warnings += 1;
                    continue;
                }
            };
            let inputs = TileInputs {
                format,
                world_flags: summary.flags,
                world: world_id,
                tile: tile_id,
                label: format!("tile ({}, {})", cell.x, cell.y),
                world_doodads: Some(&world_doodads),
                world_objects: Some(&world_objects),
                world_textures: Some(&world_textures),
                options,
            };
            let stats = tile::decode_tile(&tile_scan, &inputs, &mut uid, sink)?;
            summary.absorb(stats);
            if summary.cancelled {
                break;
            }
        }
    }

    // Stray world-level MCNKs (alpha converter artifacts): parse and file
    // them under the synthetic tile.
    if format == Format::Alpha && !summary.cancelled {
        let strays = chunks_outside(scanned, ChunkId::MCNK, &embedded_ranges);
        if !strays.is_empty() {
            log::warn!(
                "{origin}: {} MCNK chunk(s) at world level, emitting under tile (-1, -1)",
                strays.len()
            );
            summary.warnings += 1;
            if let Some(tile_id) = synthetic_tile {
                let inputs = TileInputs {
                    format,
                    world_flags: summary.flags,
                    world: world_id,
                    tile: tile_id,
                    label: format!("{origin} (world scope)"),
                    world_doodads: None,
                    world_objects: None,
                    world_textures: None,
                    options,
                };
                let mcnk_inputs = McnkInputs {
                    format,
                    orientation: scanned.orientation,
                    world_flags: summary.flags,
                    mh2o: None,
                    texture_names: &world_textures,
                    options,
                };
                let mut stats = TileStats::default();
                for (file_index, locator) in strays.iter().enumerate() {
                    if options.is_cancelled() {
                        stats.cancelled = true;
                        break;
                    }
                    let payload = scanned.payload(*locator)?;
                    let decoded = mcnk::decode(payload, file_index, &mcnk_inputs);
                    tile::emit_mcnk(decoded, &inputs, &mut stats, sink)?;
                }
                summary.absorb(stats);
            }
        }
    }

    summary.max_unique_id = uid.max();
    sink.end_world(world_id, summary.cancelled)?;
    Ok(summary)
}

/// Decode a standalone tile file as a one-tile world stream.
pub(crate) fn decode_standalone_tile<S: RecordSink>(
    scanned: &ScannedFile<'_>,
    detection: Detection,
    origin: &str,
    coords: Option<(i32, i32)>,
    options: &ParseOptions,
    sink: &mut S,
) -> Result<ParseSummary> {
    let mut summary = ParseSummary::new(origin, detection);
    summary.version = read_version(scanned, origin, &mut summary);
    summary.warnings += scanned.unknown_chunks;
    if scanned.orientation_defaulted {
        summary.warnings += 1;
    }

    let world_id = sink.begin_world(&WorldRecord {
        path: origin.to_string(),
        format: detection.format,
        version: summary.version,
        flags: 0,
        chunk_order: scanned.tag_order(),
    })?;

    let (x, y) = coords.unwrap_or_else(|| {
        log::warn!("{origin}: no tile coordinates in the file name, using (0, 0)");
        (0, 0)
    });
    let tile_id = sink.add_tile(
        world_id,
        &TileRecord {
            x,
            y,
            offset: 0,
            size: 0,
            flags: 1,
            async_id: 0,
        },
    )?;
    if (0..WORLD_TILE_DIM as i32).contains(&x) && (0..WORLD_TILE_DIM as i32).contains(&y) {
        summary.presence.set(x as usize, y as usize, true);
    }
    summary.tiles_present = 1;

    let inputs = TileInputs {
        format: detection.format,
        world_flags: 0,
        world: world_id,
        tile: tile_id,
        label: format!("tile ({x}, {y})"),
        world_doodads: None,
        world_objects: None,
        world_textures: None,
        options,
    };
    let mut uid = UidTracker::new();
    let stats = tile::decode_tile(scanned, &inputs, &mut uid, sink)?;
    summary.absorb(stats);
    summary.max_unique_id = uid.max();

    sink.end_world(world_id, summary.cancelled)?;
    Ok(summary)
}

fn read_version(scanned: &ScannedFile<'_>, origin: &str, summary: &mut ParseSummary) -> u32 {
    match scanned.first_payload(ChunkId::MVER) {
        Some(Ok(payload)) if payload.len() >= 4 => {
            u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
        }
        _ => {
            log::warn!("{origin}: missing or short MVER, version unknown");
            summary.warnings += 1;
            0
        }
    }
}

fn read_world_flags(scanned: &ScannedFile<'_>, origin: &str, summary: &mut ParseSummary) -> u32 {
    match scanned.first_payload(ChunkId::MPHD) {
        Some(Ok(payload)) if payload.len() >= 4 => {
            u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
        }
        _ => {
            log::warn!("{origin}: missing or short MPHD, flags unknown");
            summary.warnings += 1;
            0
        }
    }
}

/// Parse the MAIN presence grid in row-major (y-outer) order, populating
/// the summary grid and returning the present cells.
fn parse_main_grid(
    scanned: &ScannedFile<'_>,
    format: Format,
    origin: &str,
    summary: &mut ParseSummary,
) -> Vec<PresentCell> {
    let payload = match scanned.first_payload(ChunkId::MAIN) {
        Some(Ok(payload)) => payload,
        _ => {
            log::warn!("{origin}: world table has no MAIN grid");
            summary.warnings += 1;
            return Vec::new();
        }
    };

    let cell_size = match format {
        Format::Retail => MAIN_CELL_SIZE_RETAIL,
        Format::Alpha => MAIN_CELL_SIZE_ALPHA,
    };
    let expected = WORLD_TILE_DIM * WORLD_TILE_DIM * cell_size;
    if payload.len() != expected {
        log::warn!(
            "{origin}: MAIN is {} bytes, expected {expected}",
            payload.len()
        );
        summary.warnings += 1;
    }

    let r = ByteReader::new(payload);
    let mut cells = Vec::new();
    for y in 0..WORLD_TILE_DIM {
        for x in 0..WORLD_TILE_DIM {
            let base = (y * WORLD_TILE_DIM + x) * cell_size;
            if base + cell_size > payload.len() {
                return cells;
            }
            let (offset, size, flags, async_id, present) = match format {
                Format::Retail => {
                    let flags = r.read_u32(base).unwrap_or(0);
                    let async_id = r.read_u32(base + 4).unwrap_or(0);
                    (0, 0, flags, async_id, flags & 0x1 != 0)
                }
                Format::Alpha => {
                    let offset = r.read_u32(base).unwrap_or(0);
                    let size = r.read_u32(base + 4).unwrap_or(0);
                    let flags = r.read_u32(base + 8).unwrap_or(0);
                    let async_id = r.read_u32(base + 12).unwrap_or(0);
                    (offset, size, flags, async_id, offset > 0)
                }
            };
            if present {
                summary.presence.set(x, y, true);
                summary.tiles_present += 1;
                cells.push(PresentCell {
                    x,
                    y,
                    record: TileRecord {
                        x: x as i32,
                        y: y as i32,
                        offset,
                        size,
                        flags,
                        async_id,
                    },
                });
            }
        }
    }
    cells
}

/// Build the world-scope model tables from whichever era's chunks exist
/// outside the embedded-tile ranges.
fn world_model_tables(
    scanned: &ScannedFile<'_>,
    format: Format,
    ranges: &[(usize, usize)],
) -> (ModelTable, ModelTable) {
    let (doodad_tag, object_tag, doodad_index_tag, object_index_tag) = match format {
        Format::Retail => (
            ChunkId::MMDX,
            ChunkId::MWMO,
            Some(ChunkId::MMID),
            Some(ChunkId::MWID),
        ),
        Format::Alpha => (ChunkId::MDNM, ChunkId::MONM, None, None),
    };

    let build = |names_tag: ChunkId, index_tag: Option<ChunkId>| -> ModelTable {
        let Some(block) = first_payload_outside(scanned, names_tag, ranges) else {
            return ModelTable::default();
        };
        let names = NameTable::from_block(block);
        let indices = index_tag
            .and_then(|tag| first_payload_outside(scanned, tag, ranges))
            .map(|payload| {
                let r = ByteReader::new(payload);
                (0..payload.len() / 4)
                    .filter_map(|i| r.read_u32(i * 4).ok())
                    .collect::<Vec<_>>()
            });
        ModelTable::new(names, indices)
    };

    (
        build(doodad_tag, doodad_index_tag),
        build(object_tag, object_index_tag),
    )
}

/// World-level MDDF/MODF (WMO-only retail maps, alpha world scope).
#[allow(clippy::too_many_arguments)]
fn emit_world_placements<S: RecordSink>(
    scanned: &ScannedFile<'_>,
    ranges: &[(usize, usize)],
    inputs: &TileInputs<'_>,
    doodads: &ModelTable,
    objects: &ModelTable,
    uid: &mut UidTracker,
    stats: &mut TileStats,
    sink: &mut S,
) -> Result<()> {
    // Placement chunks inside embedded ranges belong to their tiles; the
    // tile decoder handles those.
    let has_world_level = first_payload_outside(scanned, ChunkId::MDDF, ranges).is_some()
        || first_payload_outside(scanned, ChunkId::MODF, ranges).is_some();
    if !has_world_level {
        return Ok(());
    }
    tile::emit_world_scope_placements(scanned, ranges, inputs, doodads, objects, uid, stats, sink)
}

/// Chunk locators of `tag` whose payloads fall outside all `ranges`.
fn chunks_outside(
    scanned: &ScannedFile<'_>,
    tag: ChunkId,
    ranges: &[(usize, usize)],
) -> Vec<ChunkLocator> {
    scanned
        .all(tag)
        .iter()
        .filter(|loc| {
            !ranges
                .iter()
                .any(|&(start, end)| loc.offset >= start && loc.offset < end)
        })
        .copied()
        .collect()
}

fn first_payload_outside<'a>(
    scanned: &ScannedFile<'a>,
    tag: ChunkId,
    ranges: &[(usize, usize)],
) -> Option<&'a [u8]> {
    chunks_outside(scanned, tag, ranges)
        .first()
        .and_then(|loc| scanned.payload(*loc).ok())
}
