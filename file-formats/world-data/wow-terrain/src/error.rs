//! Error types for the terrain decoder

use thiserror::Error;

use crate::chunk_id::ChunkId;

/// Result type alias for decoder operations
pub type Result<T> = std::result::Result<T, TerrainError>;

/// Error kinds produced while decoding world and tile files.
///
/// Only `Io`, `Truncated` in the outer scan, and `Cancelled` abort a file;
/// everything else is attached to the record it occurred in and decoding
/// continues.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// I/O error during open or memory-map
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// EOF reached mid-record
    #[error("truncated read at offset {offset}: wanted {wanted} bytes, {available} available")]
    Truncated {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    /// Tag not in the catalog; the chunk is skipped
    #[error("unknown chunk tag {tag} at offset {offset}")]
    UnknownTag { tag: ChunkId, offset: usize },

    /// A fixed-size chunk has the wrong length
    #[error("bad size for {tag}: got {got}, expected {expected}")]
    BadSize {
        tag: ChunkId,
        got: u32,
        expected: u32,
    },

    /// An alpha-map or shadow-map codec failed or came up short
    #[error("bad {kind} encoding: {reason}")]
    BadEncoding { kind: &'static str, reason: String },

    /// A placement cites a name index outside the index table
    #[error("unresolved {kind} reference: index {index}")]
    CrossRefUnresolved { kind: &'static str, index: u32 },

    /// Listfile lookup failed; informational
    #[error("missing asset {name} referenced by {referenced_by}")]
    AssetMissing {
        name: String,
        referenced_by: String,
    },

    /// Cooperative cancellation observed between MCNKs
    #[error("cancelled")]
    Cancelled,

    /// The record sink rejected a record
    #[error("sink error: {0}")]
    Sink(String),
}

impl TerrainError {
    /// True for kinds that are attached to records rather than propagated.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownTag { .. }
                | Self::BadSize { .. }
                | Self::BadEncoding { .. }
                | Self::CrossRefUnresolved { .. }
                | Self::AssetMissing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_display_names_all_fields() {
        let err = TerrainError::Truncated {
            offset: 12,
            wanted: 8,
            available: 3,
        };
        let text = err.to_string();
        assert!(text.contains("12"));
        assert!(text.contains("8"));
        assert!(text.contains("3"));
    }

    #[test]
    fn recoverable_classification() {
        assert!(
            TerrainError::BadEncoding {
                kind: "alpha map",
                reason: "short".into(),
            }
            .is_recoverable()
        );
        assert!(
            !TerrainError::Truncated {
                offset: 0,
                wanted: 1,
                available: 0,
            }
            .is_recoverable()
        );
        assert!(!TerrainError::Cancelled.is_recoverable());
    }
}
