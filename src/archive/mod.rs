//! Archive module - Feature-map storage and statistics for elite candidates.

mod feature_map;
mod sizer;
mod summary;

pub use feature_map::{AddOutcome, CellKey, FeatureMap};
pub use sizer::LinearMapSizer;
pub use summary::MapSummary;
