//! Cross-reference resolution
//!
//! Placement records cite names through a double indirection: the record's
//! `name_id` indexes an offset array (`MMID`/`MWID`), and the offset
//! locates a string inside the name block (`MMDX`/`MWMO`). Alpha files skip
//! the offset array, so one is synthesized from the name block itself and
//! both eras resolve through the same path. Out-of-range references yield
//! a sentinel name and a flag, never an error.

use std::collections::HashMap;

use crate::reader::split_name_block;

/// Parsed name block with `{offset → name}` lookup.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: Vec<(u32, String)>,
    by_offset: HashMap<u32, usize>,
}

impl NameTable {
    pub fn from_block(data: &[u8]) -> Self {
        let entries = split_name_block(data);
        let by_offset = entries
            .iter()
            .enumerate()
            .map(|(i, (offset, _))| (*offset, i))
            .collect();
        Self { entries, by_offset }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The name starting at `offset` within the block, if any.
    pub fn name_at(&self, offset: u32) -> Option<&str> {
        self.by_offset
            .get(&offset)
            .map(|&i| self.entries[i].1.as_str())
    }

    /// `(offset, name)` pairs in block order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries.iter().map(|(o, n)| (*o, n.as_str()))
    }

    /// The offsets of all names in block order; the synthesized index
    /// array for files that carry none.
    pub fn offsets(&self) -> Vec<u32> {
        self.entries.iter().map(|(o, _)| *o).collect()
    }
}

/// Result of resolving one `name_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub resolved: bool,
}

/// A name block joined with its index array.
#[derive(Debug, Clone, Default)]
pub struct ModelTable {
    pub names: NameTable,
    /// Byte offsets into the name block, one per index entry
    pub indices: Vec<u32>,
}

impl ModelTable {
    /// Join a name table with a parsed index array, or synthesize the
    /// array from the table itself when the file carries none.
    pub fn new(names: NameTable, indices: Option<Vec<u32>>) -> Self {
        let indices = indices.unwrap_or_else(|| names.offsets());
        Self { names, indices }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Look `name_id` up through the index array and the offset map.
    pub fn resolve(&self, name_id: u32) -> ResolvedName {
        let offset = match self.indices.get(name_id as usize) {
            Some(&offset) => offset,
            None => {
                return ResolvedName {
                    name: format!("<invalid:{name_id}>"),
                    resolved: false,
                };
            }
        };
        match self.names.name_at(offset) {
            Some(name) => ResolvedName {
                name: name.to_string(),
                resolved: true,
            },
            None => ResolvedName {
                name: format!("<invalid:{name_id}>"),
                resolved: false,
            },
        }
    }
}

/// Running maximum of placement unique ids across a world.
#[derive(Debug, Clone, Copy, Default)]
pub struct UidTracker {
    max: Option<u32>,
}

impl UidTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, unique_id: u32) {
        self.max = Some(self.max.map_or(unique_id, |m| m.max(unique_id)));
    }

    /// Highest unique id seen, if any placement was.
    pub fn max(&self) -> Option<u32> {
        self.max
    }
}
