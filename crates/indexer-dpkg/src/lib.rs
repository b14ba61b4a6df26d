//! A minimal reference ecosystem — one package scanner (`dpkg`) and one
//! distribution scanner (`os-release`) — used to exercise the Layer Scanner
//! and Coalescer end-to-end. Not a shipped scanner catalogue.

mod os_release;
mod rfc822;
mod status;

pub use os_release::OsReleaseScanner;
pub use status::DpkgScanner;
