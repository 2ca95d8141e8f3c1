
use std::path::Path;

/// Builds `(key, value)` pairs from string literals, pre-sorted by key.
pub(crate) fn records(pairs: &[(&str, &str)]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out: Vec<_> = pairs
        .iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
        .collect();
    out.sort();
    out
}

pub(crate) fn sidecar_of(path: &Path) -> std::path::PathBuf {
    crate::format::sidecar_path(path)
}
