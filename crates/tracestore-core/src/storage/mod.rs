mod builder;
mod container;
mod layout;
mod store;

pub use builder::{check_consistency, merge, merge_with, populate, populate_with};
pub use container::{check_valid_suffix, STORE_SUFFIX};
pub use store::{OriginSummary, StoreSummary, TraceIter, TraceStore};
