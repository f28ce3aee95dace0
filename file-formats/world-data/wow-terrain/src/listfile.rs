//! Listfile cross-checking
//!
//! An optional set of known asset paths lets the decoder flag broken
//! texture and model references. Comparison is by normalized form:
//! lowercase, backslashes to forward slashes, and the alpha-era `.mdx`
//! model suffix rewritten to `.m2`.

use std::collections::HashSet;

/// Normalize an asset path for listfile comparison.
pub fn normalize_asset_path(name: &str) -> String {
    let mut normalized = name.to_lowercase().replace('\\', "/");
    if let Some(stripped) = normalized.strip_suffix(".mdx") {
        normalized = format!("{stripped}.m2");
    }
    normalized
}

/// Build a lookup set from raw listfile lines, normalizing each entry.
pub fn build_listfile<I, S>(lines: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|line| normalize_asset_path(line.as_ref().trim()))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Whether the (normalized) name is known to the listfile.
pub fn is_known(listfile: &HashSet<String>, name: &str) -> bool {
    listfile.contains(&normalize_asset_path(name))
}
