//! MCNK terrain decoder
//!
//! Each of a tile's up to 256 MCNKs carries a fixed header followed by
//! sub-chunks located by header offsets. Sub-chunks decode in a fixed
//! order regardless of where the header points: layers before alpha maps
//! (alpha-map format selection needs the layer flags), shadow and liquid
//! after alpha, vertex colors before liquid. Per-sub-chunk failures attach
//! to the MCNK record and decoding continues; structural header failures
//! mark the MCNK failed without aborting the tile.

pub mod alpha_map;
pub mod header;
pub mod liquid;
pub mod shadow;
pub mod subchunks;

use crate::chunk_id::ChunkId;
use crate::error::{Result, TerrainError};
use crate::format::Format;
use crate::options::ParseOptions;
use crate::records::{
    ALPHA_MAP_SIZE, LayerRecord, LiquidRecord, MCNK_VERTEX_COUNT, McnkRecord, TILE_MCNK_DIM,
};
use crate::scanner::TagOrientation;

use header::{
    ALPHA_HEADER_SIZE, ALPHA_SHADOW_SIZE, AlphaHeader, MCCV_SIZE, MCLY_ENTRY_SIZE_RETAIL,
    MCNR_PADDED_SIZE, MCNR_SIZE, MCVT_SIZE, RetailHeader,
};
use subchunks::RawLayer;

/// Everything the per-MCNK decoder needs from its surroundings.
pub(crate) struct McnkInputs<'a> {
    pub format: Format,
    pub orientation: TagOrientation,
    /// MPHD flags of the owning world (0 when unknown)
    pub world_flags: u32,
    /// Tile-level MH2O payload, when the tile has one
    pub mh2o: Option<&'a [u8]>,
    /// Ordered texture names from the tile's MTEX (or the world's, alpha)
    pub texture_names: &'a [String],
    pub options: &'a ParseOptions,
}

/// Decoded MCNK: the record plus whichever sub-records survived.
pub(crate) struct DecodedMcnk {
    pub record: McnkRecord,
    pub heights: Option<Box<[f32; MCNK_VERTEX_COUNT]>>,
    pub normals: Option<Box<[[f32; 3]; MCNK_VERTEX_COUNT]>>,
    /// Layer records paired with their decoded alpha maps
    pub layers: Vec<(LayerRecord, Option<Box<[u8; ALPHA_MAP_SIZE]>>)>,
    pub shadow: Option<shadow::ShadowMap>,
    pub vertex_colors: Option<Box<[[u8; 4]; MCNK_VERTEX_COUNT]>>,
    pub liquid: Option<LiquidRecord>,
}

impl DecodedMcnk {
    fn bare(record: McnkRecord) -> Self {
        Self {
            record,
            heights: None,
            normals: None,
            layers: Vec::new(),
            shadow: None,
            vertex_colors: None,
            liquid: None,
        }
    }
}

/// Decode one MCNK payload. `file_index` is the MCNK's position among the
/// tile's MCNK chunks, used for coordinates in the alpha format (whose
/// header carries none) and for the MH2O table lookup.
pub(crate) fn decode(payload: &[u8], file_index: usize, inputs: &McnkInputs<'_>) -> DecodedMcnk {
    match inputs.format {
        Format::Retail => decode_retail(payload, inputs),
        Format::Alpha => decode_alpha(payload, file_index, inputs),
    }
}

/// Attach an error to the record. Truncation of a structurally required
/// region fails the MCNK; anything else fails it only under strict mode.
fn note<T>(
    result: Result<T>,
    record: &mut McnkRecord,
    strict: bool,
    structural: bool,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            let fatal = strict || (structural && matches!(err, TerrainError::Truncated { .. }));
            record.errors.push(err.to_string());
            if fatal {
                record.failed = true;
            }
            None
        }
    }
}

/// Resolve a header offset to a fixed-size sub-chunk view.
///
/// The offset may point at a tagged sub-chunk (retail files embed
/// `tag + size` headers) or directly at raw data (alpha embedded tiles);
/// a 4-byte peek distinguishes the two. A tagged sub-chunk whose declared
/// size matches neither accepted size is a `BadSize`; a region escaping
/// the MCNK is a truncation.
fn fixed_view<'a>(
    payload: &'a [u8],
    offset: usize,
    tag: ChunkId,
    orientation: TagOrientation,
    expected: usize,
    also_accept: Option<usize>,
) -> Result<&'a [u8]> {
    if let Some((size, start)) = peek_tagged(payload, offset, tag, orientation) {
        if size != expected && also_accept != Some(size) {
            return Err(TerrainError::BadSize {
                tag,
                got: size as u32,
                expected: expected as u32,
            });
        }
        let end = start + size;
        if end > payload.len() {
            return Err(TerrainError::Truncated {
                offset: start,
                wanted: size,
                available: payload.len() - start,
            });
        }
        return Ok(&payload[start..end]);
    }
    let end = offset.saturating_add(expected);
    if offset > payload.len() || end > payload.len() {
        return Err(TerrainError::Truncated {
            offset,
            wanted: expected,
            available: payload.len().saturating_sub(offset),
        });
    }
    Ok(&payload[offset..end])
}

/// Resolve a header offset to a variable-length sub-chunk view of
/// `declared` bytes, clamping (with a log line) when the region escapes
/// the MCNK.
fn variable_view<'a>(
    payload: &'a [u8],
    offset: usize,
    tag: ChunkId,
    orientation: TagOrientation,
    declared: usize,
) -> &'a [u8] {
    if let Some((size, start)) = peek_tagged(payload, offset, tag, orientation) {
        let usable = if size > 0 { size } else { declared.saturating_sub(8) };
        let end = start.saturating_add(usable).min(payload.len());
        if start + usable > payload.len() {
            log::warn!("{tag} sub-chunk escapes its MCNK, clamping to {} bytes", end - start);
        }
        return &payload[start.min(payload.len())..end];
    }
    let start = offset.min(payload.len());
    let end = offset.saturating_add(declared).min(payload.len());
    if offset.saturating_add(declared) > payload.len() {
        log::warn!("{tag} sub-chunk escapes its MCNK, clamping to {} bytes", end - start);
    }
    &payload[start..end]
}

/// If `offset` points at `tag` (in file orientation), return the embedded
/// size and the data start past the 8-byte sub-header.
fn peek_tagged(
    payload: &[u8],
    offset: usize,
    tag: ChunkId,
    orientation: TagOrientation,
) -> Option<(usize, usize)> {
    if offset + 8 > payload.len() {
        return None;
    }
    let raw = ChunkId([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ]);
    if orientation.normalize(raw) != tag {
        return None;
    }
    let size = u32::from_le_bytes([
        payload[offset + 4],
        payload[offset + 5],
        payload[offset + 6],
        payload[offset + 7],
    ]) as usize;
    Some((size, offset + 8))
}

/// Build layer records from raw MCLY entries, resolving texture names and
/// computing the per-layer alpha mode flags.
fn build_layer_records(
    raw_layers: &[RawLayer],
    inputs: &McnkInputs<'_>,
    allow_alpha_maps: bool,
    record: &mut McnkRecord,
) -> Vec<LayerRecord> {
    raw_layers
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let texture_name = inputs
                .texture_names
                .get(raw.texture_id as usize)
                .cloned();
            let mut present = raw.flags & alpha_map::LAYER_ALPHA_PRESENT != 0;
            if present && !allow_alpha_maps {
                log::debug!(
                    "layer {index} flags an alpha map but the format stores none, ignoring"
                );
                record.errors.push(
                    TerrainError::BadEncoding {
                        kind: "alpha map",
                        reason: format!("layer {index} flags an alpha map without MCAL storage"),
                    }
                    .to_string(),
                );
                present = false;
            }
            LayerRecord {
                index: index as u32,
                texture_id: raw.texture_id,
                texture_name,
                flags: raw.flags,
                alpha_offset: raw.alpha_offset,
                effect_id: raw.effect_id,
                alpha_map_present: present,
                compressed: raw.flags & alpha_map::LAYER_ALPHA_COMPRESSED != 0,
            }
        })
        .collect()
}

/// Decode the alpha maps of all flagged layers out of the MCAL view.
/// Earlier layers keep their maps when a later one fails.
fn decode_alpha_maps(
    mcal: &[u8],
    layers: &[LayerRecord],
    mcnk_flags: u32,
    inputs: &McnkInputs<'_>,
    record: &mut McnkRecord,
) -> Vec<Option<Box<[u8; ALPHA_MAP_SIZE]>>> {
    let strict = inputs.options.strict;
    layers
        .iter()
        .map(|layer| {
            if !layer.alpha_map_present || !inputs.options.emit_alpha_maps {
                return None;
            }
            let mode = alpha_map::AlphaMapMode::from_flags(
                layer.flags,
                inputs.world_flags,
                mcnk_flags,
            );
            let start = layer.alpha_offset as usize;
            if start > mcal.len() {
                note::<()>(
                    Err(TerrainError::BadEncoding {
                        kind: "alpha map",
                        reason: format!(
                            "layer {} alpha offset {start} past MCAL end {}",
                            layer.index,
                            mcal.len()
                        ),
                    }),
                    record,
                    strict,
                    false,
                );
                return None;
            }
            note(
                alpha_map::decode(&mcal[start..], mode),
                record,
                strict,
                false,
            )
        })
        .collect()
}

fn decode_retail(payload: &[u8], inputs: &McnkInputs<'_>) -> DecodedMcnk {
    let strict = inputs.options.strict;
    let header = match RetailHeader::parse(payload) {
        Ok(h) => h,
        Err(err) => {
            let mut record = empty_record(0, 0, 0, 0, true);
            record.errors.push(err.to_string());
            record.failed = true;
            return DecodedMcnk::bare(record);
        }
    };

    let mut record = McnkRecord {
        i: header.index_x,
        j: header.index_y,
        flags: header.flags,
        area_id: header.area_id,
        area_id_reliable: true,
        n_layers: header.n_layers,
        n_doodad_refs: header.n_doodad_refs,
        n_map_obj_refs: header.n_map_obj_refs,
        n_sound_emitters: header.n_sound_emitters,
        holes: header.holes,
        position: header.position.into(),
        doodad_refs: Vec::new(),
        map_object_refs: Vec::new(),
        failed: false,
        errors: Vec::new(),
    };

    if header.index_x as usize >= TILE_MCNK_DIM || header.index_y as usize >= TILE_MCNK_DIM {
        record.errors.push(format!(
            "MCNK coordinates ({}, {}) outside the 16x16 grid",
            header.index_x, header.index_y
        ));
        record.failed = true;
        return DecodedMcnk::bare(record);
    }

    let mut out = DecodedMcnk::bare(record);
    let orientation = inputs.orientation;

    // Heights
    if header.ofs_heights > 0 && !out.record.failed {
        if let Some(view) = note(
            fixed_view(
                payload,
                header.ofs_heights as usize,
                ChunkId::MCVT,
                orientation,
                MCVT_SIZE,
                None,
            ),
            &mut out.record,
            strict,
            true,
        ) {
            out.heights = note(subchunks::parse_heights(view), &mut out.record, strict, true);
        }
    }

    // Normals
    if header.ofs_normals > 0 && !out.record.failed {
        if let Some(view) = note(
            fixed_view(
                payload,
                header.ofs_normals as usize,
                ChunkId::MCNR,
                orientation,
                MCNR_SIZE,
                Some(MCNR_PADDED_SIZE),
            ),
            &mut out.record,
            strict,
            true,
        ) {
            out.normals = note(subchunks::parse_normals(view), &mut out.record, strict, true);
        }
    }

    // Layers, then the alpha maps they route
    let mut raw_layers = Vec::new();
    if header.ofs_layers > 0 && header.n_layers > 0 && !out.record.failed {
        let view = variable_view(
            payload,
            header.ofs_layers as usize,
            ChunkId::MCLY,
            orientation,
            header.n_layers as usize * MCLY_ENTRY_SIZE_RETAIL,
        );
        if let Some(parsed) = note(
            subchunks::parse_layers_retail(view, header.n_layers as usize),
            &mut out.record,
            strict,
            false,
        ) {
            raw_layers = parsed;
        }
    }
    let layer_records = build_layer_records(&raw_layers, inputs, true, &mut out.record);

    let mut alpha_maps: Vec<Option<Box<[u8; ALPHA_MAP_SIZE]>>> =
        layer_records.iter().map(|_| None).collect();
    if header.ofs_alpha > 0 && header.size_alpha > 0 && !out.record.failed {
        let mcal = variable_view(
            payload,
            header.ofs_alpha as usize,
            ChunkId::MCAL,
            orientation,
            header.size_alpha as usize,
        );
        alpha_maps =
            decode_alpha_maps(mcal, &layer_records, header.flags, inputs, &mut out.record);
    } else if inputs.options.emit_alpha_maps && !out.record.failed {
        for layer in layer_records.iter().filter(|l| l.alpha_map_present) {
            note::<()>(
                Err(TerrainError::BadEncoding {
                    kind: "alpha map",
                    reason: format!("layer {} flags an alpha map but MCAL is absent", layer.index),
                }),
                &mut out.record,
                strict,
                false,
            );
        }
    }
    out.layers = layer_records.into_iter().zip(alpha_maps).collect();

    // Placement references: doodad refs then map-object refs share MCRF
    let ref_count = header.n_doodad_refs as usize + header.n_map_obj_refs as usize;
    if header.ofs_refs > 0 && ref_count > 0 && !out.record.failed {
        let view = variable_view(
            payload,
            header.ofs_refs as usize,
            ChunkId::MCRF,
            orientation,
            ref_count * 4,
        );
        if let Some(refs) = note(
            subchunks::parse_refs(view, ref_count),
            &mut out.record,
            strict,
            false,
        ) {
            let (doodads, objects) = refs.split_at(header.n_doodad_refs as usize);
            out.record.doodad_refs = doodads.to_vec();
            out.record.map_object_refs = objects.to_vec();
        }
    }

    // Shadow map
    if header.ofs_shadow > 0
        && header.size_shadow > 0
        && inputs.options.emit_shadow_map
        && !out.record.failed
    {
        let view = variable_view(
            payload,
            header.ofs_shadow as usize,
            ChunkId::MCSH,
            orientation,
            header.size_shadow as usize,
        );
        let do_not_fix = header.flag_bits().contains(header::McnkFlags::DO_NOT_FIX_ALPHA_MAP);
        let decoded = shadow::decode(view, do_not_fix);
        if decoded.incomplete {
            out.record
                .errors
                .push(format!("shadow map incomplete: {} of 512 bytes", view.len()));
        }
        out.shadow = Some(decoded);
    }

    // Vertex colors
    if header.ofs_vertex_colors > 0 && inputs.options.emit_vertex_colors && !out.record.failed {
        if let Some(view) = note(
            fixed_view(
                payload,
                header.ofs_vertex_colors as usize,
                ChunkId::MCCV,
                orientation,
                MCCV_SIZE,
                None,
            ),
            &mut out.record,
            strict,
            true,
        ) {
            out.vertex_colors = note(
                subchunks::parse_vertex_colors(view),
                &mut out.record,
                strict,
                true,
            );
        }
    }

    // Liquid: a tile-level MH2O block wins over the legacy MCLQ
    if !out.record.failed {
        let k = header.index_y as usize * TILE_MCNK_DIM + header.index_x as usize;
        let modern = inputs.mh2o.and_then(|mh2o| {
            note(
                liquid::parse_mh2o_block(mh2o, k),
                &mut out.record,
                strict,
                false,
            )
            .flatten()
        });
        if modern.is_some() {
            out.liquid = modern;
        } else if header.ofs_liquid > 0 && header.size_liquid > 0 {
            let view = variable_view(
                payload,
                header.ofs_liquid as usize,
                ChunkId::MCLQ,
                orientation,
                header.size_liquid as usize,
            );
            out.liquid = note(liquid::parse_mclq(view), &mut out.record, strict, false);
        }
    }

    out
}

fn decode_alpha(payload: &[u8], file_index: usize, inputs: &McnkInputs<'_>) -> DecodedMcnk {
    let strict = inputs.options.strict;
    let i = (file_index % TILE_MCNK_DIM) as u32;
    let j = (file_index / TILE_MCNK_DIM) as u32;

    let header = match AlphaHeader::parse(payload) {
        Ok(h) => h,
        Err(err) => {
            let mut record = empty_record(i, j, 0, 0, false);
            record.errors.push(err.to_string());
            record.failed = true;
            return DecodedMcnk::bare(record);
        }
    };

    let mut out = DecodedMcnk::bare(McnkRecord {
        i,
        j,
        flags: header.flags,
        area_id: header.area_id,
        area_id_reliable: false,
        n_layers: header.n_layers,
        n_doodad_refs: header.n_doodad_refs,
        n_map_obj_refs: 0,
        n_sound_emitters: 0,
        holes: 0,
        position: [0.0, 0.0, 0.0].into(),
        doodad_refs: Vec::new(),
        map_object_refs: Vec::new(),
        failed: false,
        errors: Vec::new(),
    });

    // A header-only payload is a hole, not an error.
    if payload.len() == ALPHA_HEADER_SIZE {
        return out;
    }

    let layout = header.layout();

    if let Some(view) = note(
        fixed_view(
            payload,
            layout.ofs_heights,
            ChunkId::MCVT,
            inputs.orientation,
            MCVT_SIZE,
            None,
        ),
        &mut out.record,
        strict,
        true,
    ) {
        out.heights = note(subchunks::parse_heights(view), &mut out.record, strict, true);
    }

    let mut raw_layers = Vec::new();
    if header.n_layers > 0 && !out.record.failed {
        let view = variable_view(
            payload,
            layout.ofs_layers,
            ChunkId::MCLY,
            inputs.orientation,
            header.n_layers as usize * header::MCLY_ENTRY_SIZE_ALPHA,
        );
        if let Some(parsed) = note(
            subchunks::parse_layers_alpha(view, header.n_layers as usize),
            &mut out.record,
            strict,
            false,
        ) {
            raw_layers = parsed;
        }
    }
    let layer_records = build_layer_records(&raw_layers, inputs, false, &mut out.record);
    out.layers = layer_records.into_iter().map(|l| (l, None)).collect();

    if header.n_doodad_refs > 0 && !out.record.failed {
        let view = variable_view(
            payload,
            layout.ofs_refs,
            ChunkId::MCRF,
            inputs.orientation,
            header.n_doodad_refs as usize * 4,
        );
        if let Some(refs) = note(
            subchunks::parse_refs(view, header.n_doodad_refs as usize),
            &mut out.record,
            strict,
            false,
        ) {
            out.record.doodad_refs = refs;
        }
    }

    if let Some(ofs_shadow) = layout.ofs_shadow {
        if inputs.options.emit_shadow_map && !out.record.failed {
            let view = variable_view(
                payload,
                ofs_shadow,
                ChunkId::MCSH,
                inputs.orientation,
                ALPHA_SHADOW_SIZE,
            );
            let do_not_fix = header
                .flag_bits()
                .contains(header::McnkFlags::DO_NOT_FIX_ALPHA_MAP);
            let decoded = shadow::decode(view, do_not_fix);
            if decoded.incomplete {
                out.record
                    .errors
                    .push(format!("shadow map incomplete: {} of 512 bytes", view.len()));
            }
            out.shadow = Some(decoded);
        }
    }

    if let Some(ofs_colors) = layout.ofs_vertex_colors {
        if inputs.options.emit_vertex_colors && !out.record.failed {
            if let Some(view) = note(
                fixed_view(
                    payload,
                    ofs_colors,
                    ChunkId::MCCV,
                    inputs.orientation,
                    MCCV_SIZE,
                    None,
                ),
                &mut out.record,
                strict,
                true,
            ) {
                out.vertex_colors = note(
                    subchunks::parse_vertex_colors(view),
                    &mut out.record,
                    strict,
                    true,
                );
            }
        }
    }

    if let Some(ofs_liquid) = layout.ofs_liquid {
        if !out.record.failed && ofs_liquid < payload.len() {
            out.liquid = note(
                liquid::parse_mclq(&payload[ofs_liquid..]),
                &mut out.record,
                strict,
                false,
            );
        }
    }

    out
}

fn empty_record(i: u32, j: u32, flags: u32, area_id: u32, area_id_reliable: bool) -> McnkRecord {
    McnkRecord {
        i,
        j,
        flags,
        area_id,
        area_id_reliable,
        n_layers: 0,
        n_doodad_refs: 0,
        n_map_obj_refs: 0,
        n_sound_emitters: 0,
        holes: 0,
        position: [0.0, 0.0, 0.0].into(),
        doodad_refs: Vec::new(),
        map_object_refs: Vec::new(),
        failed: false,
        errors: Vec::new(),
    }
}
