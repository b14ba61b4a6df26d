//! Artifact records emitted by scanners and accumulated in the Index Report (§3).

use crate::digest::Digest;
use serde::{Deserialize, Serialize};

/// Whether a package record describes an installed binary or a source package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageKind {
    Binary,
    Source,
}

/// A single installed software package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub kind: PackageKind,
    pub arch: String,
    /// Path within the layer's filesystem this record was read from, e.g.
    /// `var/lib/dpkg/status`. Used by the coalescer's CoW pruning rule (§4.5).
    pub package_db: String,
    pub source_package: Option<Box<Package>>,
    pub repository_hint: Option<String>,
    pub module: Option<String>,
}

/// An OS distribution identity, typically read from `/etc/os-release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: String,
    pub name: String,
    pub version: String,
    pub pretty_name: String,
    pub cpe: Option<String>,
    pub arch: Option<String>,
    pub version_id: Option<String>,
    pub version_code_name: Option<String>,
    pub did: Option<String>,
}

/// A package repository a package may have been installed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub key: Option<String>,
    pub uri: Option<String>,
}

/// Associates an artifact with the layer it was introduced in, and (for
/// packages) the distribution/repository ids assigned by the coalescer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub introduced_in: Digest,
    pub distribution_id: Option<String>,
    pub repository_ids: Vec<String>,
}
