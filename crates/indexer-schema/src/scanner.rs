//! Scanner identity (§3, §4.3).

use crate::types::{ScannerName, ScannerVersion};
use serde::{Deserialize, Serialize};

/// The kind of artifact a scanner produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerKind {
    Package,
    Distribution,
    Repository,
}

/// Identifies a scanner. Two scanners are identical iff all three fields match;
/// changing `version` invalidates any prior `(layer, scanner)` results.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScannerIdentity {
    pub name: ScannerName,
    pub kind: ScannerKind,
    pub version: ScannerVersion,
}

impl ScannerIdentity {
    pub fn new(
        name: impl Into<ScannerName>,
        kind: ScannerKind,
        version: impl Into<ScannerVersion>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            version: version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_equality_requires_all_three_fields() {
        let a = ScannerIdentity::new("dpkg", ScannerKind::Package, "1.0.0");
        let b = ScannerIdentity::new("dpkg", ScannerKind::Package, "1.0.0");
        let different_version = ScannerIdentity::new("dpkg", ScannerKind::Package, "2.0.0");
        assert_eq!(a, b);
        assert_ne!(a, different_version);
    }

    #[test]
    fn identity_orders_deterministically_for_sorted_state_id_input() {
        let mut scanners = vec![
            ScannerIdentity::new("rpm", ScannerKind::Package, "1.0.0"),
            ScannerIdentity::new("dpkg", ScannerKind::Package, "1.0.0"),
        ];
        scanners.sort();
        assert_eq!(scanners[0].name.as_str(), "dpkg");
    }
}
