//! The Coalescer (§4.5): merges per-layer scanner artifacts into an
//! image-wide Index Report.

mod coalescer;
mod types;

pub use coalescer::{coalesce, EcosystemCoalescer, ReportFragment};
pub use types::{Ecosystem, LayerArtifacts};
