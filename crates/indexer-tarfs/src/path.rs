//! Path normalization for tar member names (§4.1).
//!
//! Every member path is resolved against a virtual root `.`: `.` and `..`
//! components are collapsed, a leading `/` is treated as rooted at `.` rather
//! than the real filesystem root, and byte sequences that are not valid UTF-8
//! are escaped as `\xNN` so the path can still be displayed and used as a
//! stable map key.

use std::fmt::Write as _;

/// The virtual root, always present even for an empty archive.
pub const ROOT: &str = ".";

/// Normalize a raw tar member path (as raw bytes, since tar entries are not
/// guaranteed to be valid UTF-8) into a canonical, `.`/`..`-resolved path
/// rooted at [`ROOT`].
pub fn normalize(raw: &[u8]) -> String {
    let decoded = decode_lossy_escaping_invalid(raw);
    let mut components: Vec<String> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                components.pop();
            }
            other => components.push(other.to_owned()),
        }
    }
    if components.is_empty() {
        ROOT.to_owned()
    } else {
        components.join("/")
    }
}

/// Resolve `target` (a symlink's stored target) relative to `containing_dir`,
/// unless `target` is absolute, in which case it is resolved against the
/// virtual root instead.
pub fn resolve_relative(containing_dir: &str, target: &str) -> String {
    if target.starts_with('/') {
        normalize(target.as_bytes())
    } else if containing_dir == ROOT {
        normalize(target.as_bytes())
    } else {
        normalize(format!("{containing_dir}/{target}").as_bytes())
    }
}

/// Returns the parent of a normalized path, or `None` for the root itself.
pub fn parent(path: &str) -> Option<String> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(idx) => Some(path[..idx].to_owned()),
        None => Some(ROOT.to_owned()),
    }
}

fn decode_lossy_escaping_invalid(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_owned(),
        Err(_) => {
            // Escape byte-by-byte rather than using `String::from_utf8_lossy`'s
            // replacement character, so the mapping is reversible enough for
            // display and produces a stable, deterministic path string.
            let mut out = String::with_capacity(raw.len());
            let mut rest = raw;
            loop {
                match std::str::from_utf8(rest) {
                    Ok(valid) => {
                        out.push_str(valid);
                        break;
                    }
                    Err(err) => {
                        let valid_len = err.valid_up_to();
                        out.push_str(std::str::from_utf8(&rest[..valid_len]).unwrap());
                        let bad_len = err.error_len().unwrap_or(rest.len() - valid_len);
                        for byte in &rest[valid_len..valid_len + bad_len] {
                            write!(out, "\\x{byte:02X}").expect("String write cannot fail");
                        }
                        rest = &rest[valid_len + bad_len..];
                        if rest.is_empty() {
                            break;
                        }
                    }
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_dot() {
        assert_eq!(normalize(b""), ".");
        assert_eq!(normalize(b"."), ".");
        assert_eq!(normalize(b"/"), ".");
    }

    #[test]
    fn resolves_dot_and_dotdot() {
        assert_eq!(normalize(b"./a/b"), "a/b");
        assert_eq!(normalize(b"a/b/../c"), "a/c");
        assert_eq!(normalize(b"a/../../b"), "b");
    }

    #[test]
    fn escapes_invalid_utf8() {
        let raw = [b'a', b'/', 0xFF, b'b'];
        let normalized = normalize(&raw);
        assert_eq!(normalized, "a/\\xFFb");
    }

    #[test]
    fn parent_of_root_is_none() {
        assert_eq!(parent(ROOT), None);
    }

    #[test]
    fn parent_of_top_level_entry_is_root() {
        assert_eq!(parent("a"), Some(".".to_owned()));
    }

    #[test]
    fn parent_of_nested_entry() {
        assert_eq!(parent("a/b/c"), Some("a/b".to_owned()));
    }

    #[test]
    fn resolve_relative_symlink_target() {
        assert_eq!(resolve_relative("a/b", "../c"), "a/c");
        assert_eq!(resolve_relative("a/b", "/c"), "c");
        assert_eq!(resolve_relative(ROOT, "c"), "c");
    }
}
