//! Minimal RFC822-style record parser for dpkg status files: `Key: Value`
//! lines grouped into records by blank lines, with indented continuation
//! lines folded into the previous field.

use std::collections::BTreeMap;

/// One `Package:`/`Status:`/... record, keyed by lower-cased field name.
pub type Record = BTreeMap<String, String>;

pub fn parse_records(content: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::new();
    let mut last_key: Option<String> = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(key) = &last_key {
                if let Some(value) = current.get_mut(key) {
                    value.push('\n');
                    value.push_str(line.trim());
                }
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        current.insert(key.clone(), value.trim().to_owned());
        last_key = Some(key);
    }

    if !current.is_empty() {
        records.push(current);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_record_with_trailing_blank_line() {
        let content = "Package: foo\nStatus: install ok installed\nVersion: 1.0\nArchitecture: amd64\n\n";
        let records = parse_records(content);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("package").map(String::as_str), Some("foo"));
        assert_eq!(records[0].get("version").map(String::as_str), Some("1.0"));
    }

    #[test]
    fn multiple_records_separated_by_blank_lines() {
        let content = "Package: a\nVersion: 1\n\nPackage: b\nVersion: 2\n";
        let records = parse_records(content);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("package").map(String::as_str), Some("b"));
    }

    #[test]
    fn continuation_lines_are_folded_into_the_previous_field() {
        let content = "Package: foo\nDescription: first line\n second line\nVersion: 1\n";
        let records = parse_records(content);
        assert_eq!(
            records[0].get("description").map(String::as_str),
            Some("first line\nsecond line")
        );
    }

    #[test]
    fn record_without_trailing_blank_line_is_still_captured() {
        let content = "Package: foo\nVersion: 1";
        let records = parse_records(content);
        assert_eq!(records.len(), 1);
    }
}
