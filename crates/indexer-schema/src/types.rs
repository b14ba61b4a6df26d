//! Newtype wrappers for string identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings for interoperability with
//! the persistence interface and the HTTP surface's JSON bodies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Name of a configured scanner, e.g. `"dpkg"`.
    ScannerName
);

string_newtype!(
    /// Opaque scanner version string; changing it invalidates prior scan results.
    ScannerVersion
);

string_newtype!(
    /// Name of an ecosystem bundling scanners and a coalescer, e.g. `"dpkg"`.
    EcosystemName
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_name_display_and_as_ref() {
        let name = ScannerName::new("dpkg");
        assert_eq!(name.to_string(), "dpkg");
        assert_eq!(AsRef::<str>::as_ref(&name), "dpkg");
    }

    #[test]
    fn scanner_version_serde_roundtrip() {
        let v = ScannerVersion::new("1.0.0");
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"1.0.0\"");
        let back: ScannerVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
