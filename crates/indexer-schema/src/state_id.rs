//! The opaque state identifier exposed by `GET /index_state` (§6.4).

use crate::scanner::ScannerIdentity;
use md5::{Digest as _, Md5};

/// Bumped whenever the fields hashed into the identifier change shape, so that
/// old and new identifiers never collide across an incompatible upgrade.
const STATE_ID_MAGIC: &str = "indexer-state-v1";

/// Computes a pure function of the configured scanner set: the sorted list of
/// `(name, kind, version)` tuples, prefixed with [`STATE_ID_MAGIC`], hashed
/// with MD5, hex-encoded. Two processes configured with the same scanner set
/// (in any order) produce the same identifier.
pub fn state_identifier(scanners: &[ScannerIdentity]) -> String {
    let mut sorted: Vec<&ScannerIdentity> = scanners.iter().collect();
    sorted.sort();

    let mut hasher = Md5::new();
    hasher.update(STATE_ID_MAGIC.as_bytes());
    for scanner in sorted {
        hasher.update(b"\0");
        hasher.update(scanner.name.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(format!("{:?}", scanner.kind).as_bytes());
        hasher.update(b"\0");
        hasher.update(scanner.version.as_str().as_bytes());
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ScannerKind;

    fn scanner(name: &str, version: &str) -> ScannerIdentity {
        ScannerIdentity::new(name, ScannerKind::Package, version)
    }

    #[test]
    fn identifier_is_order_independent() {
        let a = state_identifier(&[scanner("dpkg", "1"), scanner("rpm", "1")]);
        let b = state_identifier(&[scanner("rpm", "1"), scanner("dpkg", "1")]);
        assert_eq!(a, b);
    }

    #[test]
    fn changing_a_version_changes_the_identifier() {
        let a = state_identifier(&[scanner("dpkg", "1")]);
        let b = state_identifier(&[scanner("dpkg", "2")]);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_scanner_set_is_stable() {
        let a = state_identifier(&[]);
        let b = state_identifier(&[]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }
}
