//! Alpha-map codec (MCAL)
//!
//! Every texture layer beyond the first blends through a 64×64 mask. On
//! disk the mask is one of three encodings, selected by flag bits spread
//! across three chunks: the layer's MCLY flags, the world's MPHD flags and
//! the MCNK's own flags. Those bits are folded into an [`AlphaMapMode`]
//! once per layer so the codec never sees raw flag words.

use crate::error::{Result, TerrainError};
use crate::records::{ALPHA_MAP_SIZE, MAP_RESOLUTION};

/// MCLY flag bit: this layer has an alpha map.
pub const LAYER_ALPHA_PRESENT: u32 = 0x100;

/// MCLY flag bit: the alpha map is run-length encoded.
pub const LAYER_ALPHA_COMPRESSED: u32 = 0x200;

/// MPHD flag bits selecting high-resolution (8-bit) alpha storage.
pub const WORLD_BIG_ALPHA: u32 = 0x4;
pub const WORLD_HEIGHT_TEXTURING: u32 = 0x80;

/// MCNK flag bit: the encoder replicated the last row/column.
const MCNK_DO_NOT_FIX: u32 = 0x8000;

/// Low-resolution (4-bit) storage size.
pub const LOW_RES_SIZE: usize = ALPHA_MAP_SIZE / 2;

/// Decoding mode for one layer's alpha map, computed once from the three
/// flag words involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaMapMode {
    /// Run-length encoded (MCLY bit 9)
    pub compressed: bool,
    /// 8-bit storage selected by the world header (MPHD 0x4 / 0x80)
    pub high_res: bool,
    /// Replicate the last row and column after decoding (MCNK 0x8000)
    pub do_not_fix: bool,
}

impl AlphaMapMode {
    pub fn from_flags(layer_flags: u32, world_flags: u32, mcnk_flags: u32) -> Self {
        Self {
            compressed: layer_flags & LAYER_ALPHA_COMPRESSED != 0,
            high_res: world_flags & (WORLD_BIG_ALPHA | WORLD_HEIGHT_TEXTURING) != 0,
            do_not_fix: mcnk_flags & MCNK_DO_NOT_FIX != 0,
        }
    }

    /// On-disk bytes this mode consumes, or `None` for the self-terminating
    /// compressed encoding.
    pub fn encoded_size(&self) -> Option<usize> {
        if self.compressed {
            None
        } else if self.high_res {
            Some(ALPHA_MAP_SIZE)
        } else {
            Some(LOW_RES_SIZE)
        }
    }
}

/// Decode one layer's alpha map from `data` (a view into MCAL starting at
/// the layer's offset) into the full 64×64 byte mask.
pub fn decode(data: &[u8], mode: AlphaMapMode) -> Result<Box<[u8; ALPHA_MAP_SIZE]>> {
    let mut out = if mode.compressed {
        decode_rle(data)?
    } else if mode.high_res {
        decode_high_res(data)?
    } else {
        decode_low_res(data)?
    };
    if mode.do_not_fix {
        replicate_last_row_and_column(&mut out);
    }
    Ok(out)
}

/// Uncompressed 4-bit samples, two per byte, low nibble first; each nibble
/// expands to 8 bits via `(v << 4) | v`.
fn decode_low_res(data: &[u8]) -> Result<Box<[u8; ALPHA_MAP_SIZE]>> {
    if data.len() < LOW_RES_SIZE {
        return Err(TerrainError::BadEncoding {
            kind: "alpha map",
            reason: format!(
                "low-res layer needs {LOW_RES_SIZE} bytes, {} available",
                data.len()
            ),
        });
    }
    let mut out = Box::new([0u8; ALPHA_MAP_SIZE]);
    for (i, &byte) in data[..LOW_RES_SIZE].iter().enumerate() {
        let low = byte & 0x0F;
        let high = (byte >> 4) & 0x0F;
        out[i * 2] = (low << 4) | low;
        out[i * 2 + 1] = (high << 4) | high;
    }
    Ok(out)
}

/// Uncompressed 8-bit samples, copied verbatim.
fn decode_high_res(data: &[u8]) -> Result<Box<[u8; ALPHA_MAP_SIZE]>> {
    if data.len() < ALPHA_MAP_SIZE {
        return Err(TerrainError::BadEncoding {
            kind: "alpha map",
            reason: format!(
                "high-res layer needs {ALPHA_MAP_SIZE} bytes, {} available",
                data.len()
            ),
        });
    }
    let mut out = Box::new([0u8; ALPHA_MAP_SIZE]);
    out.copy_from_slice(&data[..ALPHA_MAP_SIZE]);
    Ok(out)
}

/// Run-length command stream: control byte `ctl`, fill mode when
/// `ctl & 0x80`, count `ctl & 0x7F`. Fill emits one payload byte `count`
/// times; copy emits the next `count` payload bytes. Decoding stops once
/// 4096 bytes are produced; exhausting the input earlier is an encoding
/// error and nothing is emitted.
fn decode_rle(data: &[u8]) -> Result<Box<[u8; ALPHA_MAP_SIZE]>> {
    let mut out = Box::new([0u8; ALPHA_MAP_SIZE]);
    let mut written = 0usize;
    let mut i = 0usize;

    while written < ALPHA_MAP_SIZE {
        let Some(&ctl) = data.get(i) else {
            return Err(TerrainError::BadEncoding {
                kind: "alpha map",
                reason: format!("RLE stream exhausted after {written} of {ALPHA_MAP_SIZE} bytes"),
            });
        };
        i += 1;
        let fill = ctl & 0x80 != 0;
        let count = (ctl & 0x7F) as usize;

        if fill {
            let Some(&value) = data.get(i) else {
                return Err(TerrainError::BadEncoding {
                    kind: "alpha map",
                    reason: "RLE fill command missing its value byte".into(),
                });
            };
            i += 1;
            for _ in 0..count {
                if written >= ALPHA_MAP_SIZE {
                    break;
                }
                out[written] = value;
                written += 1;
            }
        } else {
            for _ in 0..count {
                if written >= ALPHA_MAP_SIZE {
                    break;
                }
                let Some(&value) = data.get(i) else {
                    return Err(TerrainError::BadEncoding {
                        kind: "alpha map",
                        reason: format!(
                            "RLE copy command ran past its input after {written} bytes"
                        ),
                    });
                };
                i += 1;
                out[written] = value;
                written += 1;
            }
        }
    }

    Ok(out)
}

/// Replace the last column of each row with the value at x = 62 and the
/// last row with row 62, undoing the off-by-one of the original encoder.
/// Applying this twice equals applying it once.
pub fn replicate_last_row_and_column(map: &mut [u8; ALPHA_MAP_SIZE]) {
    for y in 0..MAP_RESOLUTION {
        map[y * MAP_RESOLUTION + (MAP_RESOLUTION - 1)] = map[y * MAP_RESOLUTION + (MAP_RESOLUTION - 2)];
    }
    let (rest, last_row) = map.split_at_mut(ALPHA_MAP_SIZE - MAP_RESOLUTION);
    last_row.copy_from_slice(&rest[ALPHA_MAP_SIZE - 2 * MAP_RESOLUTION..]);
}
