//! Shared helpers for building synthetic world and tile files in memory.

/// Incremental chunk-stream builder.
pub struct FileBuilder {
    data: Vec<u8>,
    reversed: bool,
}

impl FileBuilder {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            reversed: false,
        }
    }

    /// Build a file whose tags are stored byte-reversed.
    pub fn reversed() -> Self {
        Self {
            data: Vec::new(),
            reversed: true,
        }
    }

    /// Current length; the offset the next chunk's header will land at.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn chunk(&mut self, tag: &[u8; 4], payload: &[u8]) -> &mut Self {
        if self.reversed {
            let mut t = *tag;
            t.reverse();
            self.data.extend_from_slice(&t);
        } else {
            self.data.extend_from_slice(tag);
        }
        self.data
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// Builder for a retail MCNK payload: the 128-byte header plus raw
/// sub-chunk regions, with offset fields wired automatically.
pub struct RetailMcnk {
    header: Vec<u8>,
    body: Vec<u8>,
}

impl RetailMcnk {
    pub fn new(i: u32, j: u32) -> Self {
        let mut header = vec![0u8; 128];
        header[4..8].copy_from_slice(&i.to_le_bytes());
        header[8..12].copy_from_slice(&j.to_le_bytes());
        Self {
            header,
            body: Vec::new(),
        }
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.header[0..4].copy_from_slice(&flags.to_le_bytes());
        self
    }

    fn next_offset(&self) -> u32 {
        (self.header.len() + self.body.len()) as u32
    }

    fn set_u32(&mut self, at: usize, value: u32) {
        self.header[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn heights(mut self, values: &[f32; 145]) -> Self {
        let ofs = self.next_offset();
        self.set_u32(20, ofs);
        for v in values {
            self.body.extend_from_slice(&v.to_le_bytes());
        }
        self
    }

    pub fn normals(mut self, triples: &[[i8; 3]; 145]) -> Self {
        let ofs = self.next_offset();
        self.set_u32(24, ofs);
        for t in triples {
            for c in t {
                self.body.push(*c as u8);
            }
        }
        // retail pad
        self.body.extend_from_slice(&[0u8; 13]);
        self
    }

    /// `(texture_id, flags, alpha_offset, effect_id)` entries.
    pub fn layers(mut self, entries: &[(u32, u32, u32, u32)]) -> Self {
        let ofs = self.next_offset();
        self.set_u32(28, ofs);
        self.set_u32(12, entries.len() as u32);
        for (tex, flags, alpha, effect) in entries {
            self.body.extend_from_slice(&tex.to_le_bytes());
            self.body.extend_from_slice(&flags.to_le_bytes());
            self.body.extend_from_slice(&alpha.to_le_bytes());
            self.body.extend_from_slice(&effect.to_le_bytes());
        }
        self
    }

    pub fn alpha(mut self, data: &[u8]) -> Self {
        let ofs = self.next_offset();
        self.set_u32(36, ofs);
        self.set_u32(40, data.len() as u32);
        self.body.extend_from_slice(data);
        self
    }

    pub fn shadow(mut self, data: &[u8]) -> Self {
        let ofs = self.next_offset();
        self.set_u32(44, ofs);
        self.set_u32(48, data.len() as u32);
        self.body.extend_from_slice(data);
        self
    }

    pub fn vertex_colors(mut self, bgra: &[[u8; 4]; 145]) -> Self {
        let ofs = self.next_offset();
        self.set_u32(116, ofs);
        for c in bgra {
            self.body.extend_from_slice(c);
        }
        self
    }

    pub fn legacy_liquid(mut self, data: &[u8]) -> Self {
        let ofs = self.next_offset();
        self.set_u32(96, ofs);
        self.set_u32(100, data.len() as u32);
        self.body.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut payload = self.header;
        payload.extend_from_slice(&self.body);
        payload
    }
}

/// An alpha-format MCNK payload: 16-byte header, heights, 8-byte layers.
pub fn alpha_mcnk(flags: u32, area_id: u32, heights: &[f32; 145], layers: &[(u32, u32)]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&flags.to_le_bytes());
    payload.extend_from_slice(&area_id.to_le_bytes());
    payload.extend_from_slice(&(layers.len() as u32).to_le_bytes());
    payload.extend_from_slice(&0u32.to_le_bytes());
    for h in heights {
        payload.extend_from_slice(&h.to_le_bytes());
    }
    for (tex, flags) in layers {
        payload.extend_from_slice(&tex.to_le_bytes());
        payload.extend_from_slice(&flags.to_le_bytes());
    }
    payload
}

/// RLE-encode arbitrary data as copy commands (no compression).
pub fn rle_copy_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for block in data.chunks(127) {
        out.push(block.len() as u8);
        out.extend_from_slice(block);
    }
    out
}

/// MDDF entry bytes.
pub fn doodad_placement(name_id: u32, unique_id: u32, scale: u16) -> Vec<u8> {
    let mut entry = Vec::new();
    entry.extend_from_slice(&name_id.to_le_bytes());
    entry.extend_from_slice(&unique_id.to_le_bytes());
    for v in [0.0f32; 6] {
        entry.extend_from_slice(&v.to_le_bytes());
    }
    entry.extend_from_slice(&scale.to_le_bytes());
    entry.extend_from_slice(&0u16.to_le_bytes());
    entry
}

/// MODF entry bytes.
pub fn object_placement(name_id: u32, unique_id: u32, scale: u16) -> Vec<u8> {
    let mut entry = Vec::new();
    entry.extend_from_slice(&name_id.to_le_bytes());
    entry.extend_from_slice(&unique_id.to_le_bytes());
    for v in [0.0f32; 12] {
        entry.extend_from_slice(&v.to_le_bytes());
    }
    entry.extend_from_slice(&0u16.to_le_bytes()); // flags
    entry.extend_from_slice(&0u16.to_le_bytes()); // doodad_set
    entry.extend_from_slice(&0u16.to_le_bytes()); // name_set
    entry.extend_from_slice(&scale.to_le_bytes());
    entry
}
