//! Compression detection and content-type reconciliation (§4.2 step 5, §6.2).

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Tar,
    Gzip,
    Zstd,
}

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Peeks the first bytes of the body to guess compression by magic number.
pub fn detect_magic(prefix: &[u8]) -> Compression {
    if prefix.starts_with(&GZIP_MAGIC) {
        Compression::Gzip
    } else if prefix.starts_with(&ZSTD_MAGIC) {
        Compression::Zstd
    } else {
        Compression::Tar
    }
}

/// Maps a response `Content-Type` to the compression it implies, or `None`
/// when the type is blank, `application/octet-stream`, or otherwise carries
/// no compression information (in which case magic bytes decide alone).
fn from_content_type(content_type: &str) -> Result<Option<Compression>, FetchError> {
    let ct = content_type.trim().to_ascii_lowercase();
    if ct.is_empty() || ct == "application/octet-stream" {
        return Ok(None);
    }
    let base = ct.split(';').next().unwrap_or(&ct).trim();
    let compression = match base {
        "application/x-tar" => Some(Compression::Tar),
        "application/gzip" | "application/x-gzip" => Some(Compression::Gzip),
        "application/zstd" => Some(Compression::Zstd),
        "application/vnd.docker.image.rootfs.diff.tar.gzip" => Some(Compression::Gzip),
        other if other.starts_with("application/vnd.oci.image.layer.v1.tar") => {
            if other.ends_with("+gzip") {
                Some(Compression::Gzip)
            } else if other.ends_with("+zstd") {
                Some(Compression::Zstd)
            } else {
                Some(Compression::Tar)
            }
        }
        other if other.ends_with(".tar") => Some(Compression::Tar),
        other if other.ends_with(".tar+gzip") => Some(Compression::Gzip),
        other if other.ends_with(".tar+zstd") => Some(Compression::Zstd),
        _ => return Err(FetchError::UnsupportedMediaType(content_type.to_owned())),
    };
    Ok(compression)
}

/// Reconciles the magic-byte guess against the declared content type,
/// rejecting the layer as malformed if they disagree (§4.2 step 5).
pub fn reconcile(prefix: &[u8], content_type: Option<&str>) -> Result<Compression, FetchError> {
    let from_magic = detect_magic(prefix);
    let from_type = match content_type {
        Some(ct) => from_content_type(ct)?,
        None => None,
    };
    match from_type {
        Some(declared) if declared != from_magic => Err(FetchError::ContentTypeMismatch),
        _ => Ok(from_magic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_gzip_magic() {
        assert_eq!(detect_magic(&[0x1F, 0x8B, 0x08, 0x00]), Compression::Gzip);
    }

    #[test]
    fn detects_zstd_magic() {
        assert_eq!(detect_magic(&[0x28, 0xB5, 0x2F, 0xFD]), Compression::Zstd);
    }

    #[test]
    fn falls_back_to_tar() {
        assert_eq!(detect_magic(b"ustar\0\0\0"), Compression::Tar);
    }

    #[test]
    fn blank_content_type_defers_to_magic() {
        let compression = reconcile(&[0x1F, 0x8B], Some("")).unwrap();
        assert_eq!(compression, Compression::Gzip);
    }

    #[test]
    fn agreeing_content_type_is_accepted() {
        let compression =
            reconcile(&[0x1F, 0x8B], Some("application/vnd.oci.image.layer.v1.tar+gzip")).unwrap();
        assert_eq!(compression, Compression::Gzip);
    }

    #[test]
    fn disagreeing_content_type_is_rejected() {
        let err = reconcile(&[0x1F, 0x8B], Some("application/x-tar")).unwrap_err();
        assert!(matches!(err, FetchError::ContentTypeMismatch));
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        let err = reconcile(b"garbage", Some("text/plain")).unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedMediaType(_)));
    }
}
