//! The reference distribution scanner: reads `/etc/os-release` (falling back
//! to `/usr/lib/os-release`), following the same `KEY=VALUE` grammar as
//! systemd's `os-release(5)`.

use async_trait::async_trait;
use indexer_schema::{Distribution, ScannerIdentity, ScannerKind};
use indexer_scan::{LayerFs, ScanError, ScannedArtifacts, Scanner};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

const PRIMARY_PATH: &str = "etc/os-release";
const FALLBACK_PATH: &str = "usr/lib/os-release";

pub struct OsReleaseScanner;

#[async_trait]
impl Scanner for OsReleaseScanner {
    fn identity(&self) -> ScannerIdentity {
        ScannerIdentity::new("os-release", ScannerKind::Distribution, "1.0.0")
    }

    async fn scan(
        &self,
        layer: &LayerFs,
        _cancel: &CancellationToken,
    ) -> Result<ScannedArtifacts, ScanError> {
        let path = if layer.exists(PRIMARY_PATH) {
            PRIMARY_PATH
        } else if layer.exists(FALLBACK_PATH) {
            FALLBACK_PATH
        } else {
            return Ok(ScannedArtifacts::Distributions(Vec::new()));
        };

        let bytes = layer.read_file(path).map_err(|e| ScanError::Scanner {
            scanner: self.identity(),
            source: Box::new(e),
        })?;
        let content = String::from_utf8_lossy(&bytes);
        let fields = parse_fields(&content);

        let id = fields.get("ID").cloned().unwrap_or_else(|| "linux".to_owned());
        let version_id = fields.get("VERSION_ID").cloned();
        let version = version_id.clone().unwrap_or_default();

        let distribution = Distribution {
            id: format!("{id}:{version}"),
            name: fields.get("NAME").cloned().unwrap_or_else(|| id.clone()),
            version,
            pretty_name: fields.get("PRETTY_NAME").cloned().unwrap_or_default(),
            cpe: fields.get("CPE_NAME").cloned(),
            arch: None,
            version_id,
            version_code_name: fields.get("VERSION_CODENAME").cloned(),
            did: Some(id),
        };

        Ok(ScannedArtifacts::Distributions(vec![distribution]))
    }
}

fn parse_fields(content: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        fields.insert(key.trim().to_owned(), value.to_owned());
    }
    fields
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
    async fn parses_quoted_and_bare_fields() {
        let content = "ID=debian\nVERSION_ID=\"12\"\nNAME=\"Debian GNU/Linux\"\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n";
        let bytes = build_tar(|b| add_file(b, "etc/os-release", content.as_bytes()));
        let fs = layer_fs(bytes);
        let scanner = OsReleaseScanner;
        let cancel = CancellationToken::new();

        let artifacts = scanner.scan(&fs, &cancel).await.unwrap();
        let ScannedArtifacts::Distributions(distributions) = artifacts else {
            panic!("expected distributions");
        };
        assert_eq!(distributions.len(), 1);
        assert_eq!(distributions[0].id, "debian:12");
        assert_eq!(distributions[0].name, "Debian GNU/Linux");
    }

    #[tokio::test]
    async fn missing_os_release_yields_no_distributions() {
        let bytes = build_tar(|_| {});
        let fs = layer_fs(bytes);
        let scanner = OsReleaseScanner;
        let cancel = CancellationToken::new();

        let artifacts = scanner.scan(&fs, &cancel).await.unwrap();
        let ScannedArtifacts::Distributions(distributions) = artifacts else {
            panic!("expected distributions");
        };
        assert!(distributions.is_empty());
    }
}
