//! Construction and lookup for a tar-backed read-only filesystem (§4.1).

use crate::entry::{Entry, EntryKind};
use crate::error::TarFsError;
use crate::glob;
use crate::path;
use crate::source::Source;
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use tar::EntryType;
use tracing::{debug, trace, warn};

/// The metadata `stat()` returns, after symlinks have been transparently
/// resolved (§4.1 "Open").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub mtime: u64,
    /// `true` when no tar member exists at this path and the entry was
    /// inferred to fill in a missing parent directory (§4.1 "Interior
    /// directory entries are synthesized").
    pub synthesized: bool,
}

/// A lexically-sorted directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub synthesized: bool,
}

/// A random-access, read-only filesystem view over a tar byte stream.
pub struct TarFs<S: Source> {
    source: S,
    entries: BTreeMap<String, Entry>,
}

impl<S: Source> TarFs<S> {
    /// Walks the archive linearly, recording every member's normalized path,
    /// type, size, mode, mtime, and content offset. Handles concatenated
    /// archives (§4.1 "Edge cases") by continuing to parse past an
    /// end-of-archive marker when further non-null bytes follow.
    ///
    /// Where the next segment begins is computed from the members we just
    /// parsed ourselves — the highest `content offset + size`, block-aligned
    /// — rather than trusted from `tar::Entries`' own internal cursor
    /// position, which is not guaranteed to land exactly past the
    /// two-zero-block terminator. From that point we scan forward in
    /// 512-byte blocks, skipping zero (terminator padding) blocks, until a
    /// non-zero block starts the next segment or the buffer runs out.
    pub fn new(source: S) -> Result<Self, TarFsError> {
        let total_len = source.len();
        let buf = if total_len == 0 {
            Vec::new()
        } else {
            source.read_at(0, total_len)?
        };

        let mut fs = TarFs {
            source,
            entries: BTreeMap::new(),
        };
        fs.entries
            .insert(path::ROOT.to_owned(), Entry::directory(path::ROOT.to_owned(), true));

        let mut base = 0usize;
        while base < buf.len() {
            let slice = &buf[base..];
            if slice.len() < 512 || is_zero_block(&slice[..512]) {
                break;
            }

            let cursor = Cursor::new(slice);
            let archive = tar::Archive::new(cursor);
            let mut consumed_any = false;
            let mut segment_end: u64 = 0;
            for entry_result in archive.entries()? {
                let mut entry = entry_result?;
                consumed_any = true;

                let raw_path = entry.path_bytes().into_owned();
                let normalized = path::normalize(&raw_path);
                let header = entry.header();
                let entry_type = header.entry_type();
                let size = header.size().unwrap_or(0);
                let mode = header.mode().unwrap_or(0o644);
                let mtime = header.mtime().unwrap_or(0);
                let relative_offset = entry.raw_file_position();
                let content_offset = base as u64 + relative_offset;

                let end = round_up_block(relative_offset + size);
                segment_end = segment_end.max(end);

                let kind = match entry_type {
                    EntryType::Directory => EntryKind::Directory,
                    EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                        EntryKind::File
                    }
                    EntryType::Symlink => EntryKind::Symlink,
                    EntryType::Link => EntryKind::Hardlink,
                    other => {
                        trace!(?other, path = %normalized, "tarfs: recording non-representable entry type as Other");
                        EntryKind::Other
                    }
                };

                let link_target = if matches!(kind, EntryKind::Symlink | EntryKind::Hardlink) {
                    entry.link_name_bytes().map(|raw| {
                        let raw_target = path::normalize(&raw);
                        if kind == EntryKind::Symlink {
                            let containing_dir =
                                path::parent(&normalized).unwrap_or_else(|| path::ROOT.to_owned());
                            path::resolve_relative(&containing_dir, &raw_target)
                        } else {
                            raw_target
                        }
                    })
                } else {
                    None
                };

                fs.ensure_parents(&normalized);
                fs.insert_entry(Entry {
                    path: normalized,
                    kind,
                    size,
                    mode,
                    mtime,
                    content_offset,
                    link_target,
                    synthesized: false,
                });
            }

            if !consumed_any {
                break;
            }

            let mut next = segment_end as usize;
            while next + 512 <= slice.len() && is_zero_block(&slice[next..next + 512]) {
                next += 512;
            }
            if next == 0 || next >= slice.len() {
                break;
            }
            debug!(segment_end, next, base, "tarfs: consumed tar segment, checking for concatenation");
            base += next;
        }

        fs.drop_dangling_hardlinks();
        Ok(fs)
    }

    fn ensure_parents(&mut self, path: &str) {
        let mut current = path.to_owned();
        while let Some(parent) = path::parent(&current) {
            let needs_dir = !matches!(
                self.entries.get(&parent),
                Some(existing) if existing.kind == EntryKind::Directory
            );
            if needs_dir {
                self.entries
                    .insert(parent.clone(), Entry::directory(parent.clone(), true));
            }
            current = parent;
        }
    }

    /// Inserts a real tar member, applying POSIX overwrite semantics: a
    /// directory already recorded at this path is never replaced by a
    /// non-directory member (§4.1 "Lookup invariants").
    fn insert_entry(&mut self, entry: Entry) {
        if let Some(existing) = self.entries.get(&entry.path) {
            if existing.kind == EntryKind::Directory && entry.kind != EntryKind::Directory {
                warn!(path = %entry.path, "tarfs: refusing to replace directory with non-directory member");
                return;
            }
        }
        self.entries.insert(entry.path.clone(), entry);
    }

    fn drop_dangling_hardlinks(&mut self) {
        let dangling: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                e.kind == EntryKind::Hardlink
                    && e.link_target
                        .as_ref()
                        .map_or(true, |t| !self.entries.contains_key(t))
            })
            .map(|(path, _)| path.clone())
            .collect();
        for path in dangling {
            warn!(%path, "tarfs: dropping hardlink whose target does not exist");
            self.entries.remove(&path);
        }
    }

    /// Follows symlink/hardlink chains until a concrete entry is reached,
    /// detecting cycles along the way (§4.1 "Open", §9 "Cyclic data").
    fn resolve(&self, path: &str) -> Result<&Entry, TarFsError> {
        let mut current = path.to_owned();
        let mut visited = HashSet::new();
        loop {
            if !visited.insert(current.clone()) {
                return Err(TarFsError::SymlinkCycle(path.to_owned()));
            }
            let entry = self
                .entries
                .get(&current)
                .ok_or_else(|| TarFsError::NotFound(path.to_owned()))?;
            match entry.kind {
                EntryKind::Symlink | EntryKind::Hardlink => {
                    let target = entry
                        .link_target
                        .clone()
                        .ok_or_else(|| TarFsError::DanglingSymlink(current.clone()))?;
                    current = target;
                }
                EntryKind::Other => return Err(TarFsError::NotFound(path.to_owned())),
                EntryKind::Directory | EntryKind::File => return Ok(entry),
            }
        }
    }

    pub fn stat(&self, path: &str) -> Result<Stat, TarFsError> {
        let normalized = path::normalize(path.as_bytes());
        let entry = self.resolve(&normalized)?;
        Ok(Stat {
            path: entry.path.clone(),
            kind: entry.kind,
            size: entry.size,
            mode: entry.mode,
            mtime: entry.mtime,
            synthesized: entry.synthesized,
        })
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, TarFsError> {
        let normalized = path::normalize(path.as_bytes());
        let entry = self.resolve(&normalized)?;
        if entry.kind != EntryKind::File {
            return Err(TarFsError::NotAFile(normalized));
        }
        Ok(self.source.read_at(entry.content_offset, entry.size)?)
    }

    pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, TarFsError> {
        let normalized = path::normalize(path.as_bytes());
        let entry = self.resolve(&normalized)?;
        if entry.kind != EntryKind::Directory {
            return Err(TarFsError::NotADirectory(normalized));
        }
        let dir_path = entry.path.clone();
        let mut children: Vec<DirEntry> = self
            .entries
            .iter()
            .filter_map(|(child_path, child)| {
                let parent = path::parent(child_path)?;
                if parent != dir_path {
                    return None;
                }
                let name = child_path.rsplit('/').next().unwrap_or(child_path).to_owned();
                Some(DirEntry {
                    name,
                    path: child_path.clone(),
                    kind: child.kind,
                    synthesized: child.synthesized,
                })
            })
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    /// Matches a shell-style glob against every known path, lexically sorted.
    pub fn glob(&self, pattern: &str) -> Vec<String> {
        let mut matches: Vec<String> = self
            .entries
            .keys()
            .filter(|path| glob::matches(pattern, path))
            .cloned()
            .collect();
        matches.sort();
        matches
    }

    pub fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }
}

fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

fn round_up_block(offset: u64) -> u64 {
    const BLOCK: u64 = 512;
    (offset + BLOCK - 1) / BLOCK * BLOCK
}
