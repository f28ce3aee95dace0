//! 4-byte chunk identifiers
//!
//! Tags are kept in forward (documentation) order: `ChunkId::MVER` is the
//! bytes `MVER`. On disk a file stores its tags either forward or reversed
//! as a whole-file property; the scanner normalizes to forward order while
//! walking, so everything downstream compares against these constants.

use serde::Serialize;

/// 4-byte chunk identifier in forward byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    // Containers and headers
    pub const MVER: Self = Self(*b"MVER");
    pub const MPHD: Self = Self(*b"MPHD");
    pub const MHDR: Self = Self(*b"MHDR");
    pub const MCIN: Self = Self(*b"MCIN");

    // Presence
    pub const MAIN: Self = Self(*b"MAIN");

    // Asset names
    pub const MTEX: Self = Self(*b"MTEX");
    pub const MMDX: Self = Self(*b"MMDX");
    pub const MWMO: Self = Self(*b"MWMO");
    /// M2 model names (alpha-era counterpart of MMDX)
    pub const MDNM: Self = Self(*b"MDNM");
    /// World-object names (alpha-era counterpart of MWMO)
    pub const MONM: Self = Self(*b"MONM");

    // Asset indices (retail only)
    pub const MMID: Self = Self(*b"MMID");
    pub const MWID: Self = Self(*b"MWID");

    // Placements
    pub const MDDF: Self = Self(*b"MDDF");
    pub const MODF: Self = Self(*b"MODF");

    // Alpha-era world-object auxiliaries; recognized so they are not
    // reported as unknown, payloads are not interpreted
    pub const MAOC: Self = Self(*b"MAOC");
    pub const MAOF: Self = Self(*b"MAOF");

    // Terrain
    pub const MCNK: Self = Self(*b"MCNK");
    pub const MCVT: Self = Self(*b"MCVT");
    pub const MCNR: Self = Self(*b"MCNR");
    pub const MCLY: Self = Self(*b"MCLY");
    pub const MCRF: Self = Self(*b"MCRF");
    pub const MCAL: Self = Self(*b"MCAL");
    pub const MCSH: Self = Self(*b"MCSH");
    pub const MCLQ: Self = Self(*b"MCLQ");
    pub const MCSE: Self = Self(*b"MCSE");
    pub const MCCV: Self = Self(*b"MCCV");
    pub const MCLV: Self = Self(*b"MCLV");

    // Water (modern, tile level)
    pub const MH2O: Self = Self(*b"MH2O");

    /// Every tag the decoder understands at any level.
    pub const CATALOG: &'static [Self] = &[
        Self::MVER,
        Self::MPHD,
        Self::MHDR,
        Self::MCIN,
        Self::MAIN,
        Self::MTEX,
        Self::MMDX,
        Self::MWMO,
        Self::MDNM,
        Self::MONM,
        Self::MMID,
        Self::MWID,
        Self::MDDF,
        Self::MODF,
        Self::MAOC,
        Self::MAOF,
        Self::MCNK,
        Self::MCVT,
        Self::MCNR,
        Self::MCLY,
        Self::MCRF,
        Self::MCAL,
        Self::MCSH,
        Self::MCLQ,
        Self::MCSE,
        Self::MCCV,
        Self::MCLV,
        Self::MH2O,
    ];

    /// Tags used to fix the per-file tag orientation.
    pub const ORIENTATION_PROBES: &'static [Self] = &[Self::MVER, Self::MPHD, Self::MAIN];

    /// The same tag with its bytes reversed.
    #[must_use]
    pub fn reversed(self) -> Self {
        let [a, b, c, d] = self.0;
        Self([d, c, b, a])
    }

    /// Whether this tag is in the catalog.
    pub fn is_known(self) -> bool {
        Self::CATALOG.contains(&self)
    }

    /// Human-readable form; non-ASCII bytes are escaped.
    pub fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversal_round_trips() {
        assert_eq!(ChunkId::MVER.reversed().0, *b"REVM");
        assert_eq!(ChunkId::MVER.reversed().reversed(), ChunkId::MVER);
    }

    #[test]
    fn catalog_contains_every_terrain_subchunk() {
        for tag in [
            ChunkId::MCVT,
            ChunkId::MCNR,
            ChunkId::MCLY,
            ChunkId::MCRF,
            ChunkId::MCAL,
            ChunkId::MCSH,
            ChunkId::MCLQ,
            ChunkId::MCSE,
            ChunkId::MCCV,
            ChunkId::MCLV,
        ] {
            assert!(tag.is_known(), "{tag} missing from catalog");
        }
    }

    #[test]
    fn unknown_tag_is_not_known() {
        assert!(!ChunkId(*b"XXXX").is_known());
    }

    #[test]
    fn display_is_forward_order() {
        assert_eq!(ChunkId::MCNK.to_string(), "MCNK");
    }
}
