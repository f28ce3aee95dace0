//! Shadow-map decoding (MCSH)
//!
//! A 64×64 bit array packed LSB-first into 512 bytes. Short chunks are
//! zero-padded and flagged incomplete; the same last-row/last-column
//! replication that applies to alpha maps applies here, on bits.

use crate::records::{ALPHA_MAP_SIZE, MAP_RESOLUTION, SHADOW_MAP_SIZE};

/// Decoded shadow map plus whether the input covered all 512 bytes.
#[derive(Debug, Clone)]
pub struct ShadowMap {
    pub data: Box<[u8; SHADOW_MAP_SIZE]>,
    pub incomplete: bool,
}

/// Decode up to 512 bytes of packed shadow bits.
pub fn decode(data: &[u8], do_not_fix: bool) -> ShadowMap {
    let mut packed = Box::new([0u8; SHADOW_MAP_SIZE]);
    let take = data.len().min(SHADOW_MAP_SIZE);
    packed[..take].copy_from_slice(&data[..take]);
    let incomplete = take < SHADOW_MAP_SIZE;

    if do_not_fix {
        let mut bits = unpack(&packed);
        for y in 0..MAP_RESOLUTION {
            bits[y * MAP_RESOLUTION + (MAP_RESOLUTION - 1)] =
                bits[y * MAP_RESOLUTION + (MAP_RESOLUTION - 2)];
        }
        let (rest, last_row) = bits.split_at_mut(ALPHA_MAP_SIZE - MAP_RESOLUTION);
        last_row.copy_from_slice(&rest[ALPHA_MAP_SIZE - 2 * MAP_RESOLUTION..]);
        packed = pack(&bits);
    }

    ShadowMap {
        data: packed,
        incomplete,
    }
}

fn unpack(packed: &[u8; SHADOW_MAP_SIZE]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(ALPHA_MAP_SIZE);
    for byte in packed {
        for bit in 0..8 {
            bits.push((byte >> bit) & 1);
        }
    }
    bits
}

fn pack(bits: &[u8]) -> Box<[u8; SHADOW_MAP_SIZE]> {
    let mut packed = Box::new([0u8; SHADOW_MAP_SIZE]);
    for (i, &bit) in bits.iter().enumerate().take(ALPHA_MAP_SIZE) {
        if bit != 0 {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    packed
}
