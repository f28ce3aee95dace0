//! Parse configuration
//!
//! Every option is passed explicitly to a parse call; nothing is read from
//! the environment.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Options governing one parse.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Known asset paths; referenced texture/model names not in the set go
    /// to the missing-asset stream. Shared read-only across decoders.
    pub listfile: Option<Arc<HashSet<String>>>,
    /// Fail an MCNK on its first sub-chunk error instead of attaching and
    /// continuing.
    pub strict: bool,
    /// Decode MCCV vertex colors.
    pub emit_vertex_colors: bool,
    /// Decode MCSH shadow maps.
    pub emit_shadow_map: bool,
    /// Decode MCAL alpha maps.
    pub emit_alpha_maps: bool,
    /// Cooperative cancellation flag, checked between MCNKs.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            listfile: None,
            strict: false,
            emit_vertex_colors: true,
            emit_shadow_map: true,
            emit_alpha_maps: true,
            cancel: None,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
