//! Cross-crate scenarios that need the Layer Scanner, Coalescer, and
//! in-memory Persistence working together through the real `Indexer` entry
//! point rather than any one collaborator in isolation.

use indexer::{ArenaSection, Config, ControllerSection};
use indexer_coalesce::{Ecosystem, EcosystemCoalescer};
use indexer_controller::FileLockSource;
use indexer_dpkg::DpkgScanner;
use indexer_persist::InMemoryPersistence;
use indexer_schema::digest::{Algorithm, Hasher};
use indexer_schema::{Digest, LayerDescription, Manifest};
use indexer_scan::Scanner;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tar::{Builder, Header};
use tokio_util::sync::CancellationToken;

fn digest(n: u8) -> Digest {
    use std::str::FromStr;
    Digest::from_str(&format!("sha256:{}", format!("{n:02x}").repeat(32))).unwrap()
}

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

fn body_digest(body: &[u8]) -> Digest {
    let mut hasher = Hasher::new(Algorithm::Sha256);
    hasher.update(body);
    hasher.finalize()
}

/// Serves `body` over plain HTTP for every connection accepted on a loopback
/// ephemeral port, bumping `hits` once per request. Runs on a plain OS thread
/// since it only needs to outlive the test, not be driven by the tokio
/// runtime under test.
fn spawn_http_server(body: Vec<u8>) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            hits_clone.fetch_add(1, Ordering::SeqCst);
            let mut discard = [0u8; 4096];
            let _ = stream.read(&mut discard);
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body);
        }
    });

    (addr, hits)
}

fn dpkg_ecosystem() -> EcosystemCoalescer {
    let identity = DpkgScanner.identity();
    let ecosystem = Ecosystem {
        name: "dpkg".into(),
        package_scanners: vec![identity],
        distribution_scanners: vec![],
        repository_scanners: vec![],
    };
    EcosystemCoalescer::new(ecosystem)
}

fn test_config(arena_root: std::path::PathBuf) -> Config {
    Config {
        arena: ArenaSection {
            root: arena_root,
            fetch_concurrency: 4,
        },
        controller: ControllerSection::default(),
    }
}

/// §8 scenario 4: a package present in the base layer and absent from the
/// same package-db path in a layer above it is pruned from the final report;
/// a package re-declared at that path in the top layer survives.
#[tokio::test]
async fn two_layer_cow_prune_end_to_end() {
    let base = build_tar(|b| {
        add_file(
            b,
            "var/lib/dpkg/status",
            b"Package: foo\nStatus: install ok installed\nVersion: 1.0\nArchitecture: amd64\n\n\
              Package: bar\nStatus: install ok installed\nVersion: 1.0\nArchitecture: amd64\n\n",
        );
    });
    let top = build_tar(|b| {
        add_file(
            b,
            "var/lib/dpkg/status",
            b"Package: foo\nStatus: install ok installed\nVersion: 1.0\nArchitecture: amd64\n\n",
        );
    });

    let (base_addr, _base_hits) = spawn_http_server(base.clone());
    let (top_addr, _top_hits) = spawn_http_server(top.clone());

    let base_layer = LayerDescription::new(body_digest(&base), format!("http://{base_addr}/base.tar"));
    let top_layer = LayerDescription::new(body_digest(&top), format!("http://{top_addr}/top.tar"));
    let manifest = Manifest::new(digest(1), vec![base_layer, top_layer]);

    let persistence = Arc::new(InMemoryPersistence::new());
    let lock_dir = tempfile::tempdir().unwrap();
    let lock_source = Arc::new(FileLockSource::new(lock_dir.path()));
    let arena_dir = tempfile::tempdir().unwrap();
    let config = test_config(arena_dir.path().to_path_buf());
    let scanners: Vec<Arc<dyn Scanner>> = vec![Arc::new(DpkgScanner)];

    let indexer = indexer::Indexer::new(&config, persistence, lock_source, scanners, vec![dpkg_ecosystem()]);
    let cancel = CancellationToken::new();

    let report = indexer.index(&manifest, &cancel).await;

    assert!(report.success, "index run did not succeed: {}", report.err);
    let names: Vec<&str> = report.packages.values().map(|p| p.name.as_str()).collect();
    assert!(names.contains(&"foo"), "expected foo to survive pruning: {names:?}");
    assert!(!names.contains(&"bar"), "expected bar to be pruned: {names:?}");
}

/// §8 scenario 6: two requests for the same manifest launched simultaneously
/// serialize through the manifest lock; the second observes the cached
/// report rather than re-indexing, so the layer is fetched at most once.
#[tokio::test]
async fn concurrent_identical_requests_fetch_the_layer_at_most_once() {
    let body = build_tar(|b| {
        add_file(
            b,
            "var/lib/dpkg/status",
            b"Package: foo\nStatus: install ok installed\nVersion: 1.0\nArchitecture: amd64\n\n",
        );
    });
    let (addr, hits) = spawn_http_server(body.clone());
    let layer = LayerDescription::new(body_digest(&body), format!("http://{addr}/layer.tar"));
    let manifest = Manifest::new(digest(2), vec![layer]);

    let persistence = Arc::new(InMemoryPersistence::new());
    let lock_dir = tempfile::tempdir().unwrap();
    let lock_source = Arc::new(FileLockSource::new(lock_dir.path()));
    let arena_dir = tempfile::tempdir().unwrap();
    let config = test_config(arena_dir.path().to_path_buf());
    let scanners: Vec<Arc<dyn Scanner>> = vec![Arc::new(DpkgScanner)];

    let indexer = indexer::Indexer::new(&config, persistence, lock_source, scanners, vec![dpkg_ecosystem()]);
    let cancel_a = CancellationToken::new();
    let cancel_b = CancellationToken::new();

    let (first, second) = tokio::join!(
        indexer.index(&manifest, &cancel_a),
        indexer.index(&manifest, &cancel_b)
    );

    assert!(first.success, "first request did not succeed: {}", first.err);
    assert!(second.success, "second request did not succeed: {}", second.err);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
