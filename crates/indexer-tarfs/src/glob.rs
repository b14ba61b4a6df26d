//! A small, self-contained shell-style glob matcher.
//!
//! TarFS is not a real filesystem, so a filesystem-walking glob crate is the
//! wrong tool here; this matches a pattern against an already-known path
//! string directly, supporting `*`, `?`, and `[...]` character classes.

pub fn matches(pattern: &str, path: &str) -> bool {
    matches_bytes(pattern.as_bytes(), path.as_bytes())
}

fn matches_bytes(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some(b'*') => {
            matches_bytes(&pattern[1..], text)
                || (!text.is_empty() && matches_bytes(pattern, &text[1..]))
        }
        Some(b'?') => !text.is_empty() && matches_bytes(&pattern[1..], &text[1..]),
        Some(b'[') => match parse_class(pattern) {
            Some((class_matches, rest)) => {
                !text.is_empty() && class_matches(text[0]) && matches_bytes(rest, &text[1..])
            }
            None => !text.is_empty() && text[0] == b'[' && matches_bytes(&pattern[1..], &text[1..]),
        },
        Some(&literal) => !text.is_empty() && text[0] == literal && matches_bytes(&pattern[1..], &text[1..]),
    }
}

/// Parses a leading `[...]` class, returning a matcher closure plus the
/// remainder of the pattern after the closing bracket.
fn parse_class(pattern: &[u8]) -> Option<(impl Fn(u8) -> bool + '_, &[u8])> {
    let end = pattern.iter().position(|&b| b == b']')?;
    if end == 0 {
        return None;
    }
    let body = &pattern[1..end];
    let negate = body.first() == Some(&b'!');
    let set = if negate { &body[1..] } else { body };
    let set = set.to_vec();
    let matcher = move |b: u8| {
        let hit = set.contains(&b);
        if negate {
            !hit
        } else {
            hit
        }
    };
    Some((matcher, &pattern[end + 1..]))
}
