//! The Index Report: the pipeline's mutable accumulator and final output (§3).

use crate::artifact::{Distribution, Environment, Package, Repository};
use crate::digest::Digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a manifest currently sits in the controller's state machine (§4.6),
/// stored as a string so the report can be serialized without leaking the
/// controller crate's state type into this one.
pub type StateName = String;

/// The final, persistable output of indexing a manifest.
///
/// Starts empty when the controller enters `CheckManifest`, accumulates
/// per-layer artifacts through `ScanLayers`/`Coalesce`, and reaches a terminal
/// state of `IndexFinished` (success=true) or `IndexError` (success=false,
/// `err` populated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    pub manifest_digest: Digest,
    pub state: StateName,
    pub success: bool,
    pub err: String,
    pub packages: BTreeMap<String, Package>,
    pub distributions: BTreeMap<String, Distribution>,
    pub repositories: BTreeMap<String, Repository>,
    pub environments: BTreeMap<String, Vec<Environment>>,
}

impl IndexReport {
    /// A freshly-initialized report for a manifest that has just entered the
    /// pipeline: empty artifact maps, not yet terminal.
    pub fn new(manifest_digest: Digest, state: impl Into<StateName>) -> Self {
        Self {
            manifest_digest,
            state: state.into(),
            success: false,
            err: String::new(),
            packages: BTreeMap::new(),
            distributions: BTreeMap::new(),
            repositories: BTreeMap::new(),
            environments: BTreeMap::new(),
        }
    }

    pub fn mark_finished(&mut self, state: impl Into<StateName>) {
        self.state = state.into();
        self.success = true;
        self.err.clear();
    }

    pub fn mark_error(&mut self, state: impl Into<StateName>, message: impl Into<String>) {
        self.state = state.into();
        self.success = false;
        self.err = message.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn digest() -> Digest {
        Digest::from_str(&format!("sha256:{}", "ab".repeat(32))).unwrap()
    }

    #[test]
    fn empty_manifest_report_has_empty_maps_and_succeeds() {
        let mut report = IndexReport::new(digest(), "CheckManifest");
        report.mark_finished("IndexFinished");
        assert!(report.success);
        assert!(report.err.is_empty());
        assert!(report.packages.is_empty());
    }

    #[test]
    fn mark_error_clears_success_and_records_message() {
        let mut report = IndexReport::new(digest(), "ScanLayers");
        report.mark_error("IndexError", "fetch failed: timeout");
        assert!(!report.success);
        assert_eq!(report.err, "fetch failed: timeout");
    }
}
