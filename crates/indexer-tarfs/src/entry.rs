//! The per-member record kept by [`crate::archive::TarFs`] after its initial walk.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    Hardlink,
    /// Device, fifo, char, or block special files. Report as not-exist (§4.1).
    Other,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub mtime: u64,
    /// Byte offset of the member's content within the archive. Only meaningful
    /// for [`EntryKind::File`]; `0` otherwise.
    pub content_offset: u64,
    /// Raw (un-resolved) symlink/hardlink target, normalized against the
    /// member's containing directory at walk time.
    pub link_target: Option<String>,
    /// `true` when this entry was synthesized to fill in a missing parent
    /// directory, rather than read from an explicit tar member.
    pub synthesized: bool,
}

impl Entry {
    pub fn directory(path: String, synthesized: bool) -> Self {
        Self {
            path,
            kind: EntryKind::Directory,
            size: 0,
            mode: 0o755,
            mtime: 0,
            content_offset: 0,
            link_target: None,
            synthesized,
        }
    }
}
