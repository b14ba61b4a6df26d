//! Inputs to a coalescing pass (§4.5).

use indexer_schema::{Distribution, EcosystemName, Package, Repository, ScannerIdentity};

/// Scanner results already fetched from persistence for one layer, scoped to
/// one ecosystem's scanners. Built by the caller (the controller) via the
/// `*ByLayer` persistence queries; the coalescer never touches persistence
/// directly.
#[derive(Debug, Clone, Default)]
pub struct LayerArtifacts {
    pub packages: Vec<(String, Package)>,
    pub distributions: Vec<(String, Distribution)>,
    pub repositories: Vec<(String, Repository)>,
}

/// `{name, package scanners, distribution scanners, repository scanners}`
/// (§GLOSSARY "Ecosystem"). The scanner lists are carried for registration
/// and `state_identifier` purposes; the coalescing pass itself operates on
/// already-fetched [`LayerArtifacts`] and does not dispatch by scanner.
#[derive(Debug, Clone)]
pub struct Ecosystem {
    pub name: EcosystemName,
    pub package_scanners: Vec<ScannerIdentity>,
    pub distribution_scanners: Vec<ScannerIdentity>,
    pub repository_scanners: Vec<ScannerIdentity>,
}

impl Ecosystem {
    pub fn new(name: impl Into<EcosystemName>) -> Self {
        Self {
            name: name.into(),
            package_scanners: Vec::new(),
            distribution_scanners: Vec::new(),
            repository_scanners: Vec::new(),
        }
    }

    /// Every scanner this ecosystem registers, in a stable order (package,
    /// then distribution, then repository scanners).
    pub fn all_scanners(&self) -> Vec<ScannerIdentity> {
        self.package_scanners
            .iter()
            .chain(self.distribution_scanners.iter())
            .chain(self.repository_scanners.iter())
            .cloned()
            .collect()
    }
}
