//! Manifest and layer description types (§3).

use crate::digest::Digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where and how to fetch a layer's compressed bytes.
///
/// Immutable after construction: every field is set at parse time and never
/// mutated by the fetch arena or the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDescription {
    pub digest: Digest,
    pub uri: String,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub media_type: Option<String>,
}

impl LayerDescription {
    pub fn new(digest: Digest, uri: impl Into<String>) -> Self {
        Self {
            digest,
            uri: uri.into(),
            headers: BTreeMap::new(),
            media_type: None,
        }
    }
}

/// An image's digest plus its ordered, base-to-top list of layer descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub digest: Digest,
    pub layers: Vec<LayerDescription>,
}

impl Manifest {
    pub fn new(digest: Digest, layers: Vec<LayerDescription>) -> Self {
        Self { digest, layers }
    }

    /// Layer descriptions with duplicate digests collapsed, preserving the order
    /// of first appearance. Per the invariant in §3: "duplicates ... MUST be
    /// collapsed before scanning."
    pub fn unique_layers(&self) -> Vec<&LayerDescription> {
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            if seen.insert(layer.digest.clone()) {
                out.push(layer);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn digest(n: u8) -> Digest {
        Digest::from_str(&format!("sha256:{}", format!("{n:02x}").repeat(32))).unwrap()
    }

    #[test]
    fn unique_layers_collapses_duplicates_preserving_order() {
        let a = LayerDescription::new(digest(0xaa), "https://example/a");
        let b = LayerDescription::new(digest(0xbb), "https://example/b");
        let manifest = Manifest::new(
            digest(0x01),
            vec![a.clone(), b.clone(), a.clone()],
        );
        let unique = manifest.unique_layers();
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].digest, a.digest);
        assert_eq!(unique[1].digest, b.digest);
    }

    #[test]
    fn empty_manifest_has_no_layers() {
        let manifest = Manifest::new(digest(0x01), Vec::new());
        assert!(manifest.unique_layers().is_empty());
    }
}
