//! Chunk scanner and tag-orientation detection
//!
//! Walks a file as a stream of `{tag, size, payload}` records and builds an
//! index of chunk locations by tag, so consumers can access chunks in any
//! order regardless of where they appear in the file.
//!
//! Tag byte order is a per-file property: some files store `MVER`, others
//! `REVM`. The scanner probes the first chunks against a small set of tags
//! that every world or tile file starts with and fixes the orientation for
//! the whole file; the index always holds forward-order tags.

use std::collections::HashMap;

use crate::chunk_id::ChunkId;
use crate::error::{Result, TerrainError};
use crate::reader::ByteReader;

/// Size of the `{tag, size}` chunk header.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// How many leading chunks are probed for a known tag before the
/// orientation defaults to forward.
const ORIENTATION_PROBE_LIMIT: usize = 3;

/// Per-file tag byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagOrientation {
    /// Tags appear as documented (`MVER`)
    #[default]
    Forward,
    /// Tags appear byte-reversed (`REVM`)
    Reversed,
}

impl TagOrientation {
    /// Normalize a raw on-disk tag to forward order.
    pub fn normalize(self, raw: ChunkId) -> ChunkId {
        match self {
            Self::Forward => raw,
            Self::Reversed => raw.reversed(),
        }
    }
}

/// Location of one chunk payload within the scanned view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocator {
    /// Absolute offset of the payload (past the 8-byte header)
    pub offset: usize,
    /// Payload size in bytes
    pub size: u32,
}

/// One chunk in file order.
#[derive(Debug, Clone, Copy)]
pub struct ChunkEntry {
    pub tag: ChunkId,
    pub locator: ChunkLocator,
}

/// A fully scanned view with its chunk index.
#[derive(Debug)]
pub struct ScannedFile<'a> {
    reader: ByteReader<'a>,
    /// Detected tag orientation for the whole view
    pub orientation: TagOrientation,
    /// True when no probe tag matched and forward was assumed
    pub orientation_defaulted: bool,
    /// Chunks in order of appearance (unknown tags excluded)
    pub chunks: Vec<ChunkEntry>,
    /// Count of skipped unknown-tag chunks
    pub unknown_chunks: usize,
    index: HashMap<ChunkId, Vec<ChunkLocator>>,
}

impl<'a> ScannedFile<'a> {
    /// Scan a standalone view, auto-detecting tag orientation.
    pub fn scan(data: &'a [u8]) -> Result<Self> {
        let (orientation, defaulted) = detect_orientation(data);
        if defaulted && !data.is_empty() {
            log::warn!(
                "no known tag in the first {ORIENTATION_PROBE_LIMIT} chunks, assuming forward tag order"
            );
        }
        Self::scan_with_orientation(data, orientation, defaulted)
    }

    /// Scan a view whose orientation is already fixed (embedded tile blobs
    /// inherit the orientation of their enclosing world file).
    pub fn scan_with_orientation(
        data: &'a [u8],
        orientation: TagOrientation,
        orientation_defaulted: bool,
    ) -> Result<Self> {
        let reader = ByteReader::new(data);
        let mut chunks = Vec::new();
        let mut index: HashMap<ChunkId, Vec<ChunkLocator>> = HashMap::new();
        let mut unknown_chunks = 0usize;

        let mut offset = 0usize;
        while offset < data.len() {
            let raw = ChunkId(
                reader
                    .bytes(offset, 4)?
                    .try_into()
                    .map_err(|_| TerrainError::Truncated {
                        offset,
                        wanted: 4,
                        available: data.len() - offset,
                    })?,
            );
            let size = reader.read_u32(offset + 4)?;
            let payload_offset = offset + CHUNK_HEADER_SIZE;
            let end = payload_offset
                .checked_add(size as usize)
                .ok_or(TerrainError::Truncated {
                    offset,
                    wanted: size as usize,
                    available: data.len() - payload_offset,
                })?;
            if end > data.len() {
                return Err(TerrainError::Truncated {
                    offset: payload_offset,
                    wanted: size as usize,
                    available: data.len() - payload_offset,
                });
            }

            let tag = orientation.normalize(raw);
            if tag.is_known() {
                let locator = ChunkLocator {
                    offset: payload_offset,
                    size,
                };
                chunks.push(ChunkEntry { tag, locator });
                index.entry(tag).or_default().push(locator);
            } else {
                log::warn!(
                    "skipping: {}",
                    TerrainError::UnknownTag { tag: raw, offset }
                );
                unknown_chunks += 1;
            }

            offset = end;
        }

        log::debug!(
            "scan complete: {} chunks, {} unique tags, {} unknown",
            chunks.len(),
            index.len(),
            unknown_chunks
        );

        Ok(Self {
            reader,
            orientation,
            orientation_defaulted,
            chunks,
            unknown_chunks,
            index,
        })
    }

    /// The underlying byte view.
    pub fn reader(&self) -> ByteReader<'a> {
        self.reader
    }

    /// All locations of a tag, in file order.
    pub fn all(&self, tag: ChunkId) -> &[ChunkLocator] {
        self.index.get(&tag).map_or(&[], Vec::as_slice)
    }

    /// First location of a tag, if present.
    pub fn first(&self, tag: ChunkId) -> Option<ChunkLocator> {
        self.all(tag).first().copied()
    }

    pub fn has(&self, tag: ChunkId) -> bool {
        self.index.contains_key(&tag)
    }

    /// Borrow a chunk payload.
    pub fn payload(&self, locator: ChunkLocator) -> Result<&'a [u8]> {
        self.reader.bytes(locator.offset, locator.size as usize)
    }

    /// Payload of the first chunk with this tag.
    pub fn first_payload(&self, tag: ChunkId) -> Option<Result<&'a [u8]>> {
        self.first(tag).map(|loc| self.payload(loc))
    }

    /// Observed tag order, for round-trip fidelity records.
    pub fn tag_order(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.tag.as_str()).collect()
    }
}

/// Probe the first chunks for a known tag in either byte order.
///
/// Returns the orientation and whether it was defaulted. Probing advances
/// using the size field, which is unaffected by tag orientation.
fn detect_orientation(data: &[u8]) -> (TagOrientation, bool) {
    let reader = ByteReader::new(data);
    let mut offset = 0usize;
    for _ in 0..ORIENTATION_PROBE_LIMIT {
        let Ok(raw) = reader.bytes(offset, 4) else {
            break;
        };
        let raw = ChunkId([raw[0], raw[1], raw[2], raw[3]]);
        if ChunkId::ORIENTATION_PROBES.contains(&raw) {
            return (TagOrientation::Forward, false);
        }
        if ChunkId::ORIENTATION_PROBES.contains(&raw.reversed()) {
            return (TagOrientation::Reversed, false);
        }
        let Ok(size) = reader.read_u32(offset + 4) else {
            break;
        };
        let Some(next) = offset
            .checked_add(CHUNK_HEADER_SIZE)
            .and_then(|o| o.checked_add(size as usize))
        else {
            break;
        };
        offset = next;
    }
    (TagOrientation::Forward, true)
}
