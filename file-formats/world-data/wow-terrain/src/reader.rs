//! Bounds-checked little-endian reads over a borrowed byte view
//!
//! All offsets are absolute within the view. A view may be a whole
//! memory-mapped file, an embedded tile blob, or a single chunk payload;
//! the reader never grows or copies.

use crate::error::{Result, TerrainError};

/// Read-only random-access view over file bytes.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Total length of the underlying view.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len).ok_or(TerrainError::Truncated {
            offset,
            wanted: len,
            available: self.data.len().saturating_sub(offset),
        })?;
        if end > self.data.len() {
            return Err(TerrainError::Truncated {
                offset,
                wanted: len,
                available: self.data.len().saturating_sub(offset),
            });
        }
        Ok(&self.data[offset..end])
    }

    /// Borrow everything from `offset` to the end of the view.
    pub fn tail(&self, offset: usize) -> Result<&'a [u8]> {
        self.bytes(offset, self.data.len().saturating_sub(offset))
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn read_i8(&self, offset: usize) -> Result<i8> {
        Ok(self.bytes(offset, 1)?[0] as i8)
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        let b = self.bytes(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let b = self.bytes(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        let b = self.bytes(offset, 4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_f32(&self, offset: usize) -> Result<f32> {
        let b = self.bytes(offset, 4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Three consecutive little-endian f32 values.
    pub fn read_vec3(&self, offset: usize) -> Result<[f32; 3]> {
        Ok([
            self.read_f32(offset)?,
            self.read_f32(offset + 4)?,
            self.read_f32(offset + 8)?,
        ])
    }

    /// Null-terminated string starting at `offset`, decoded as UTF-8 with
    /// replacement for invalid sequences. The terminator is not included.
    /// A missing terminator is a truncation.
    pub fn read_cstring(&self, offset: usize) -> Result<String> {
        let tail = self.tail(offset)?;
        let nul = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(TerrainError::Truncated {
                offset,
                wanted: tail.len() + 1,
                available: tail.len(),
            })?;
        Ok(String::from_utf8_lossy(&tail[..nul]).into_owned())
    }

    /// Fixed-width string field, trimmed at the first null.
    pub fn read_fixed_string(&self, offset: usize, width: usize) -> Result<String> {
        let raw = self.bytes(offset, width)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

/// Split a name-block payload into `(byte offset, name)` pairs.
///
/// Name blocks (`MTEX`, `MMDX`, `MWMO`, `MDNM`, `MONM`) are concatenated
/// null-terminated strings; the recorded offsets are what index chunks
/// (`MMID`/`MWID`) point at. Empty entries produced by doubled terminators
/// are skipped, matching how the files pad their tables.
pub fn split_name_block(data: &[u8]) -> Vec<(u32, String)> {
    let mut names = Vec::new();
    let mut start = 0usize;
    for (i, &b) in data.iter().enumerate() {
        if b == 0 {
            if i > start {
                names.push((
                    start as u32,
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
            start = i + 1;
        }
    }
    // Trailing bytes without a terminator still name something.
    if start < data.len() {
        names.push((
            start as u32,
            String::from_utf8_lossy(&data[start..]).into_owned(),
        ));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn primitive_reads_are_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x80, 0x3F];
        let r = ByteReader::new(&data);
        assert_eq!(r.read_u8(0).unwrap(), 0x01);
        assert_eq!(r.read_u16(0).unwrap(), 0x0201);
        assert_eq!(r.read_u32(0).unwrap(), 0x0403_0201);
        assert_eq!(r.read_f32(4).unwrap(), 1.0);
    }

    #[test]
    fn out_of_bounds_is_truncated_with_accounting() {
        let data = [0u8; 4];
        let r = ByteReader::new(&data);
        match r.read_u32(2) {
            Err(TerrainError::Truncated {
                offset,
                wanted,
                available,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(wanted, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn cstring_reads_until_terminator() {
        let data = b"abc\0def\0";
        let r = ByteReader::new(data);
        assert_eq!(r.read_cstring(0).unwrap(), "abc");
        assert_eq!(r.read_cstring(4).unwrap(), "def");
        assert!(r.read_cstring(8).is_err() || r.read_cstring(8).unwrap().is_empty());
    }

    #[test]
    fn cstring_without_terminator_is_truncated() {
        let data = b"abc";
        let r = ByteReader::new(data);
        assert!(matches!(
            r.read_cstring(0),
            Err(TerrainError::Truncated { .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let data = [0x61, 0xFF, 0x62, 0x00];
        let r = ByteReader::new(&data);
        let s = r.read_cstring(0).unwrap();
        assert!(s.starts_with('a'));
        assert!(s.ends_with('b'));
    }

    #[test]
    fn fixed_string_trims_at_first_null() {
        let data = b"tex\0\0\0\0\0";
        let r = ByteReader::new(data);
        assert_eq!(r.read_fixed_string(0, 8).unwrap(), "tex");
    }

    #[test]
    fn name_block_records_offsets() {
        let block = b"tree.m2\0rock.m2\0";
        let names = split_name_block(block);
        assert_eq!(
            names,
            vec![(0, "tree.m2".to_string()), (8, "rock.m2".to_string())]
        );
    }

    #[test]
    fn name_block_skips_doubled_terminators() {
        let block = b"a.blp\0\0b.blp\0";
        let names = split_name_block(block);
        assert_eq!(
            names,
            vec![(0, "a.blp".to_string()), (7, "b.blp".to_string())]
        );
    }
}
