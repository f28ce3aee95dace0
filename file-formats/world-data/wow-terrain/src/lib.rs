//! Parser for WDT world tables and ADT terrain tiles
//!
//! This crate decodes the chunked binary terrain files of both on-disk
//! eras and normalizes their contents into a typed record stream consumed
//! through the [`RecordSink`] trait. The older "alpha" layout embeds
//! per-tile terrain inside the world file; the newer "retail" layout keeps
//! each tile in a separate file. Both are detected and handled
//! transparently.
//!
//! ## Formats
//!
//! Both eras share the same outer container: a flat sequence of
//! `{tag, size, payload}` chunks with no file header. Era detection is
//! automatic (version numbers, structural sizes, tag signatures), as is
//! the per-file tag byte order, which occurs both forward and reversed in
//! the wild.
//!
//! | Era | World | Tiles | Model names |
//! |-----|-------|-------|-------------|
//! | Alpha | `MVER` < 18, 128-byte `MPHD` | embedded in the world file | `MDNM` / `MONM` |
//! | Retail | `MVER` 18, 32-byte `MPHD` | one `.adt` file per tile | `MMDX`+`MMID` / `MWMO`+`MWID` |
//!
//! ## Examples
//!
//! ```no_run
//! use wow_terrain::{MemorySink, ParseOptions, parse_file};
//!
//! # fn main() -> wow_terrain::Result<()> {
//! let mut sink = MemorySink::new();
//! let summary = parse_file("World/Maps/Azeroth/Azeroth.wdt", &ParseOptions::default(), &mut sink)?;
//!
//! println!("format: {}", summary.format);
//! println!("tiles:  {}", summary.tiles_present);
//! println!("mcnks:  {}", summary.mcnks);
//! if let Some(max) = summary.max_unique_id {
//!     println!("max placement uid: {max}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Decoding is single-threaded and file-serial; run one parser per file to
//! parallelize. The decoder holds no state across files beyond the
//! read-only memory map it owns for the duration of one parse.

pub mod chunk_id;
pub mod error;
pub mod format;
pub mod listfile;
pub mod mcnk;
pub mod options;
pub mod reader;
pub mod records;
pub mod resolver;
pub mod scanner;
pub mod sink;
pub mod tile;
pub mod world;

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

pub use crate::error::{Result, TerrainError};
pub use crate::format::{Container, Detection, Format};
pub use crate::options::ParseOptions;
pub use crate::records::{
    LayerRecord, LiquidLayer, LiquidRecord, McnkRecord, ModelKind, PlacementRecord, TileGrid,
    TileRecord, Vec3, WorldRecord,
};
pub use crate::scanner::{ChunkLocator, ScannedFile, TagOrientation};
pub use crate::sink::{LayerId, McnkId, MemorySink, NullSink, RecordSink, TileId, WorldId};
pub use crate::world::{MphdFlags, ParseSummary};

/// Parse one world table or standalone tile file, streaming records into
/// the sink. The file is memory-mapped for the duration of the parse.
pub fn parse_file<P: AsRef<Path>, S: RecordSink>(
    path: P,
    options: &ParseOptions,
    sink: &mut S,
) -> Result<ParseSummary> {
    let path = path.as_ref();
    let file = File::open(path)?;
    // Read-only map over an input we never write back.
    #[allow(unsafe_code)]
    let mmap = unsafe { Mmap::map(&file)? };
    parse_bytes(&mmap, &path.display().to_string(), options, sink)
}

/// Parse an in-memory view. `origin` labels the records and supplies the
/// container hint (extension) and tile coordinates (a `Map_x_y` stem) when
/// the chunks alone are ambiguous.
pub fn parse_bytes<S: RecordSink>(
    data: &[u8],
    origin: &str,
    options: &ParseOptions,
    sink: &mut S,
) -> Result<ParseSummary> {
    let scanned = ScannedFile::scan(data)?;
    let detection = format::detect(&scanned, Some(Path::new(origin)));
    log::debug!(
        "{origin}: detected {:?} {} ({} chunks)",
        detection.container,
        detection.format,
        scanned.chunks.len()
    );
    match detection.container {
        Container::WorldTable => world::decode_world(&scanned, detection, origin, options, sink),
        Container::Tile => {
            let coords = Path::new(origin)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(tile::tile_coords_from_name);
            world::decode_standalone_tile(&scanned, detection, origin, coords, options, sink)
        }
    }
}

/// Parse a directory of `.adt` tile files as one world stream, in
/// row-major tile order. Tile coordinates come from the `Map_x_y.adt`
/// file-name convention.
pub fn parse_tile_directory<P: AsRef<Path>, S: RecordSink>(
    dir: P,
    options: &ParseOptions,
    sink: &mut S,
) -> Result<ParseSummary> {
    let dir = dir.as_ref();
    let origin = dir.display().to_string();

    let mut files: Vec<(Option<(i32, i32)>, std::path::PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("adt"))
        })
        .map(|path| {
            let coords = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(tile::tile_coords_from_name);
            (coords, path)
        })
        .collect();
    if files.is_empty() {
        return Err(TerrainError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no .adt files in {origin}"),
        )));
    }
    // Row-major: y-outer, x-inner; unnamed tiles go last in path order.
    files.sort_by(|(a, pa), (b, pb)| {
        let key = |c: &Option<(i32, i32)>| c.map_or((i32::MAX, i32::MAX), |(x, y)| (y, x));
        key(a).cmp(&key(b)).then_with(|| pa.cmp(pb))
    });

    // The first tile fixes the world's format and version.
    let first = File::open(&files[0].1)?;
    #[allow(unsafe_code)]
    let first_map = unsafe { Mmap::map(&first)? };
    let first_scan = ScannedFile::scan(&first_map)?;
    let detection = Detection {
        container: Container::Tile,
        format: format::detect(&first_scan, Some(&files[0].1)).format,
    };
    let version = first_scan
        .first_payload(chunk_id::ChunkId::MVER)
        .and_then(|p| p.ok())
        .filter(|p| p.len() >= 4)
        .map_or(0, |p| u32::from_le_bytes([p[0], p[1], p[2], p[3]]));
    drop(first_scan);
    drop(first_map);

    let mut summary = ParseSummary {
        path: origin.clone(),
        container: Container::Tile,
        format: detection.format,
        version,
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
    };

    let world_id = sink.begin_world(&WorldRecord {
        path: origin.clone(),
        format: detection.format,
        version,
        flags: 0,
        chunk_order: Vec::new(),
    })?;

    let mut uid = resolver::UidTracker::new();
    for (coords, path) in &files {
        if options.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        let file = File::open(path)?;
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        let scanned = match ScannedFile::scan(&mmap) {
            Ok(scanned) => scanned,
            Err(err) => {
                log::warn!("{}: scan failed: {err}", path.display());
                summary.warnings += 1;
                continue;
            }
        };
        summary.warnings += scanned.unknown_chunks;

        let (x, y) = coords.unwrap_or_else(|| {
            log::warn!(
                "{}: no tile coordinates in the file name, using (0, 0)",
                path.display()
            );
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
        if (0..records::WORLD_TILE_DIM as i32).contains(&x)
            && (0..records::WORLD_TILE_DIM as i32).contains(&y)
        {
            summary.presence.set(x as usize, y as usize, true);
        }
        summary.tiles_present += 1;

        let inputs = tile::TileInputs {
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
        let stats = tile::decode_tile(&scanned, &inputs, &mut uid, sink)?;
        summary.mcnks += stats.mcnks;
        summary.failed_mcnks += stats.failed_mcnks;
        summary.placements += stats.placements;
        summary.warnings += stats.warnings;
        summary.missing_assets += stats.missing_assets;
        summary.cancelled |= stats.cancelled;
        if summary.cancelled {
            break;
        }
    }

    summary.max_unique_id = uid.max();
    sink.end_world(world_id, summary.cancelled)?;
    Ok(summary)
}

/// Write the `uid.ini` artifact: the highest placement unique id observed
/// across a world, in `max_unique_id=<N>` form.
pub fn write_uid_ini<P: AsRef<Path>>(dir: P, max_unique_id: u32) -> Result<()> {
    let path = dir.as_ref().join("uid.ini");
    let mut file = File::create(path)?;
    writeln!(file, "max_unique_id={max_unique_id}")?;
    Ok(())
}
