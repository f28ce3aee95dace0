//! Format and container detection
//!
//! Two eras of the on-disk layout coexist: the alpha variant embeds tile
//! data inside the world file and uses its own name-table tags, the retail
//! variant splits tiles into separate files. Classification runs over a
//! scanned file using tag signatures and structural sizes; the first
//! matching rule wins.

use std::path::Path;

use serde::Serialize;

use crate::chunk_id::ChunkId;
use crate::scanner::ScannedFile;

/// On-disk format era.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Alpha,
    Retail,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alpha => write!(f, "alpha"),
            Self::Retail => write!(f, "retail"),
        }
    }
}

/// What kind of file this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    /// Top-level world table (tile presence grid, world-scoped chunks)
    WorldTable,
    /// A single terrain tile
    Tile,
}

/// Classification result for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub container: Container,
    pub format: Format,
}

/// Alpha-only tag signatures.
const ALPHA_TAGS: &[ChunkId] = &[ChunkId::MDNM, ChunkId::MONM, ChunkId::MAOC, ChunkId::MAOF];

/// Retail-only tag signatures.
const RETAIL_TAGS: &[ChunkId] = &[ChunkId::MMDX, ChunkId::MMID, ChunkId::MWMO, ChunkId::MWID];

/// MPHD payload sizes per era.
const MPHD_SIZE_ALPHA: u32 = 128;
const MPHD_SIZE_RETAIL: u32 = 32;

/// Versions below this are alpha-era.
const RETAIL_MIN_VERSION: u32 = 18;

/// Classify a scanned file.
///
/// `path` is only a hint for the container when neither `MAIN` nor `MCNK`
/// is present (an empty or header-only file).
pub fn detect(scanned: &ScannedFile<'_>, path: Option<&Path>) -> Detection {
    Detection {
        container: detect_container(scanned, path),
        format: detect_format(scanned),
    }
}

fn detect_format(scanned: &ScannedFile<'_>) -> Format {
    // Rule 1: pre-18 version number
    if let Some(Ok(payload)) = scanned.first_payload(ChunkId::MVER) {
        if payload.len() >= 4 {
            let version = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
            if version < RETAIL_MIN_VERSION {
                return Format::Alpha;
            }
        }
    }

    // Rule 2: MPHD structural size
    if let Some(loc) = scanned.first(ChunkId::MPHD) {
        if loc.size == MPHD_SIZE_ALPHA {
            return Format::Alpha;
        }
        if loc.size == MPHD_SIZE_RETAIL {
            return Format::Retail;
        }
    }

    // Rules 3 and 4: tag signatures
    if ALPHA_TAGS.iter().any(|&t| scanned.has(t)) {
        return Format::Alpha;
    }
    if RETAIL_TAGS.iter().any(|&t| scanned.has(t)) {
        return Format::Retail;
    }

    // Rule 5
    Format::Retail
}

fn detect_container(scanned: &ScannedFile<'_>, path: Option<&Path>) -> Container {
    // A MAIN grid marks a world table even when MCNKs are also present:
    // alpha worlds carry their tiles embedded.
    if scanned.has(ChunkId::MAIN) {
        return Container::WorldTable;
    }
    if scanned.has(ChunkId::MCNK) {
        return Container::Tile;
    }
    match path.and_then(|p| p.extension()).and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("adt") => Container::Tile,
        _ => Container::WorldTable,
    }
}
