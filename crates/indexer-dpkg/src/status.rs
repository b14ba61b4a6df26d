//! The reference package scanner: reads `var/lib/dpkg/status` (one record per
//! installed package) and `var/lib/dpkg/status.d/*` (one file per package,
//! the distroless layout), per scenarios 2 and 3.

use crate::rfc822::{parse_records, Record};
use async_trait::async_trait;
use indexer_schema::{Package, PackageKind, ScannerIdentity, ScannerKind};
use indexer_scan::{LayerFs, ScanError, ScannedArtifacts, Scanner};
use indexer_tarfs::EntryKind;
use tokio_util::sync::CancellationToken;

const STATUS_PATH: &str = "var/lib/dpkg/status";
const STATUS_D_DIR: &str = "var/lib/dpkg/status.d";

pub struct DpkgScanner;

impl DpkgScanner {
    fn identity_value() -> ScannerIdentity {
        ScannerIdentity::new("dpkg", ScannerKind::Package, "1.0.0")
    }

    fn scan_error(&self, err: indexer_tarfs::TarFsError) -> ScanError {
        ScanError::Scanner {
            scanner: self.identity(),
            source: Box::new(err),
        }
    }
}

#[async_trait]
impl Scanner for DpkgScanner {
    fn identity(&self) -> ScannerIdentity {
        Self::identity_value()
    }

    async fn scan(
        &self,
        layer: &LayerFs,
        _cancel: &CancellationToken,
    ) -> Result<ScannedArtifacts, ScanError> {
        let mut packages = Vec::new();

        if layer.exists(STATUS_PATH) {
            let bytes = layer.read_file(STATUS_PATH).map_err(|e| self.scan_error(e))?;
            let content = String::from_utf8_lossy(&bytes);
            for record in parse_records(&content) {
                if let Some(package) = record_to_package(&record, STATUS_PATH) {
                    packages.push(package);
                }
            }
        }

        if layer.exists(STATUS_D_DIR) {
            let entries = layer.read_dir(STATUS_D_DIR).map_err(|e| self.scan_error(e))?;
            for entry in entries {
                if entry.kind != EntryKind::File {
                    continue;
                }
                let bytes = layer.read_file(&entry.path).map_err(|e| self.scan_error(e))?;
                let content = String::from_utf8_lossy(&bytes);
                for record in parse_records(&content) {
                    if let Some(package) = record_to_package(&record, &entry.path) {
                        packages.push(package);
                    }
                }
            }
        }

        Ok(ScannedArtifacts::Packages(packages))
    }
}

/// `status.d` records carry no `Status:` field at all, and are always
/// installed (§8 scenario 3); a `status` record is installed unless its
/// `Status:` field says otherwise.
fn is_installed(record: &Record) -> bool {
    match record.get("status") {
        Some(status) => status.contains("installed"),
        None => true,
    }
}

fn record_to_package(record: &Record, package_db: &str) -> Option<Package> {
    if !is_installed(record) {
        return None;
    }
    let name = record.get("package")?.clone();
    let version = record.get("version")?.clone();
    let arch = record.get("architecture").cloned().unwrap_or_default();

    let source_package = Some(Box::new(match record.get("source") {
        Some(source_field) => {
            let (source_name, source_version) = split_source_field(source_field, &version);
            Package {
                name: source_name,
                version: source_version,
                kind: PackageKind::Source,
                arch: arch.clone(),
                package_db: package_db.to_owned(),
                source_package: None,
                repository_hint: None,
                module: None,
            }
        }
        // No `Source:` field: the package is its own source (§9 open question resolution).
        None => Package {
            name: name.clone(),
            version: version.clone(),
            kind: PackageKind::Source,
            arch: arch.clone(),
            package_db: package_db.to_owned(),
            source_package: None,
            repository_hint: None,
            module: None,
        },
    }));

    Some(Package {
        name,
        version,
        kind: PackageKind::Binary,
        arch,
        package_db: package_db.to_owned(),
        source_package,
        repository_hint: None,
        module: None,
    })
}

/// Accepts both the bare `Name` grammar and the `Name (Version)` grammar,
/// splitting on the first `" ("`/`")"` pair and falling back to the whole
/// field as the name with the package's own version when no parenthesized
/// version is present.
fn split_source_field(field: &str, default_version: &str) -> (String, String) {
    if let Some(open) = field.find(" (") {
        if let Some(close) = field[open..].find(')') {
            let name = field[..open].trim().to_owned();
            let version = field[open + 2..open + close].trim().to_owned();
            return (name, version);
        }
    }
    (field.trim().to_owned(), default_version.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexer_tarfs::{InMemorySource, Source, TarFs};
    use tar::{Builder, Header};

    fn build_tar(entries: impl FnOnce(&mut Builder<Vec<u8>>)) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());
        entries(&mut builder);
        builder.into_inner().unwrap()
    }

    fn add_file(builder: &mut Builder<Vec<u8>>, path: &str, content: &[u8]) {
        let mut header = Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, content).unwrap();
    }

    fn layer_fs(bytes: Vec<u8>) -> LayerFs {
        let source: Box<dyn Source> = Box::new(InMemorySource::new(bytes));
        TarFs::new(source).unwrap()
    }

    #[tokio::test]
    async fn simple_dpkg_layer_yields_one_package_with_default_source() {
        let bytes = build_tar(|b| {
            add_file(
                b,
                "var/lib/dpkg/status",
                b"Package: foo\nStatus: install ok installed\nVersion: 1.0\nArchitecture: amd64\n\n",
            );
        });
        let fs = layer_fs(bytes);
        let scanner = DpkgScanner;
        let cancel = CancellationToken::new();

        let artifacts = scanner.scan(&fs, &cancel).await.unwrap();
        let ScannedArtifacts::Packages(packages) = artifacts else {
            panic!("expected packages");
        };
        assert_eq!(packages.len(), 1);
        let package = &packages[0];
        assert_eq!(package.name, "foo");
        assert_eq!(package.version, "1.0");
        assert_eq!(package.kind, PackageKind::Binary);
        assert_eq!(package.package_db, "var/lib/dpkg/status");
        let source = package.source_package.as_ref().unwrap();
        assert_eq!(source.name, "foo");
        assert_eq!(source.version, "1.0");
        assert_eq!(source.kind, PackageKind::Source);
    }

    #[tokio::test]
    async fn distroless_status_d_file_has_no_status_field_and_is_installed() {
        let bytes = build_tar(|b| {
            add_file(
                b,
                "var/lib/dpkg/status.d/foo",
                b"Package: foo\nVersion: 2.0\nArchitecture: amd64\n\n",
            );
        });
        let fs = layer_fs(bytes);
        let scanner = DpkgScanner;
        let cancel = CancellationToken::new();

        let artifacts = scanner.scan(&fs, &cancel).await.unwrap();
        let ScannedArtifacts::Packages(packages) = artifacts else {
            panic!("expected packages");
        };
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].version, "2.0");
        assert_eq!(packages[0].package_db, "var/lib/dpkg/status.d/foo");
    }

    #[tokio::test]
    async fn not_installed_status_is_excluded() {
        let bytes = build_tar(|b| {
            add_file(
                b,
                "var/lib/dpkg/status",
                b"Package: foo\nStatus: deinstall ok config-files\nVersion: 1.0\nArchitecture: amd64\n\n",
            );
        });
        let fs = layer_fs(bytes);
        let scanner = DpkgScanner;
        let cancel = CancellationToken::new();

        let artifacts = scanner.scan(&fs, &cancel).await.unwrap();
        let ScannedArtifacts::Packages(packages) = artifacts else {
            panic!("expected packages");
        };
        assert!(packages.is_empty());
    }

    #[test]
    fn source_field_with_explicit_version_splits_name_and_version() {
        let (name, version) = split_source_field("libfoo (1.2-3)", "9.9");
        assert_eq!(name, "libfoo");
        assert_eq!(version, "1.2-3");
    }

    #[test]
    fn source_field_without_version_falls_back_to_package_version() {
        let (name, version) = split_source_field("libfoo", "9.9");
        assert_eq!(name, "libfoo");
        assert_eq!(version, "9.9");
    }
}
