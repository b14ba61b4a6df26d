//! The populate algorithm: fetch, tee through a hasher, decompress into a
//! seekable buffer file, verify, publish (§4.2 "Populate algorithm").

use crate::buffer::BufferData;
use crate::compression::{self, Compression};
use crate::error::FetchError;
use futures::StreamExt;
use indexer_schema::LayerDescription;
use std::io::Write;
use std::path::Path;

enum DecodeSink {
    Tar(std::fs::File),
    Gzip(flate2::write::GzDecoder<std::fs::File>),
    Zstd(zstd::stream::write::Decoder<'static, std::fs::File>),
}

impl DecodeSink {
    fn new(compression: Compression, file: std::fs::File) -> Result<Self, FetchError> {
        Ok(match compression {
            Compression::Tar => DecodeSink::Tar(file),
            Compression::Gzip => DecodeSink::Gzip(flate2::write::GzDecoder::new(file)),
            Compression::Zstd => DecodeSink::Zstd(zstd::stream::write::Decoder::new(file)?),
        })
    }

    fn write_all(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        match self {
            DecodeSink::Tar(f) => f.write_all(chunk),
            DecodeSink::Gzip(d) => d.write_all(chunk),
            DecodeSink::Zstd(d) => d.write_all(chunk),
        }
    }

    fn finish(self) -> std::io::Result<std::fs::File> {
        match self {
            DecodeSink::Tar(f) => Ok(f),
            DecodeSink::Gzip(d) => d.finish(),
            DecodeSink::Zstd(d) => d.finish(),
        }
    }
}

fn validate(description: &LayerDescription) -> Result<(), FetchError> {
    if description.uri.is_empty() {
        return Err(FetchError::InvalidDescription("empty uri".to_owned()));
    }
    let url = reqwest::Url::parse(&description.uri)
        .map_err(|e| FetchError::InvalidDescription(format!("uri: {e}")))?;
    if url.host_str().is_none() {
        return Err(FetchError::InvalidDescription(
            "uri must be absolute".to_owned(),
        ));
    }
    Ok(())
}

/// Fetches and realizes a single layer. On digest mismatch, the temp file is
/// removed before returning, so no buffer is ever published under either
/// digest (§8 "Boundary behaviors").
pub(crate) async fn populate(
    root: &Path,
    description: &LayerDescription,
    client: &reqwest::Client,
) -> Result<BufferData, FetchError> {
    validate(description)?;

    let mut request = client.get(&description.uri);
    for (name, values) in &description.headers {
        for value in values {
            request = request.header(name.as_str(), value.as_str());
        }
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        let snippet_len = body.len().min(256);
        let body_snippet = String::from_utf8_lossy(&body[..snippet_len]).into_owned();
        return Err(FetchError::Http {
            status: status.as_u16(),
            body_snippet,
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let tmp = tempfile::NamedTempFile::new_in(root)?;
    let (file, path) = tmp.keep().map_err(|e| FetchError::Io(e.error))?;
    let mut file_opt = Some(file);

    let mut hasher = indexer_schema::digest::Hasher::new(description.digest.algorithm());
    let mut stream = response.bytes_stream();
    let mut sink: Option<DecodeSink> = None;
    let mut prefix_buf: Vec<u8> = Vec::with_capacity(4);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        match &mut sink {
            Some(active) => active.write_all(&chunk)?,
            None => {
                prefix_buf.extend_from_slice(&chunk);
                if prefix_buf.len() >= 4 {
                    let compression = compression::reconcile(
                        &prefix_buf[..4],
                        content_type.as_deref(),
                    )?;
                    let file = file_opt.take().expect("file consumed exactly once");
                    let mut new_sink = DecodeSink::new(compression, file)?;
                    new_sink.write_all(&prefix_buf)?;
                    sink = Some(new_sink);
                }
            }
        }
    }

    let sink = match sink {
        Some(s) => s,
        None => {
            // Body shorter than 4 bytes (e.g. empty): decide from whatever we have.
            let compression = compression::reconcile(&prefix_buf, content_type.as_deref())?;
            let file = file_opt.take().expect("file consumed exactly once");
            let mut s = DecodeSink::new(compression, file)?;
            s.write_all(&prefix_buf)?;
            s
        }
    };
    let file = sink.finish()?;
    file.sync_all()?;

    let actual = hasher.finalize();
    if actual != description.digest {
        let _ = std::fs::remove_file(&path);
        return Err(FetchError::DigestMismatch {
            expected: description.digest.clone(),
            actual,
        });
    }

    Ok(BufferData::new(file, path))
}
