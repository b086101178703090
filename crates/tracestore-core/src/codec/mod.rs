//! Attribute codec: typed values to and from the canonical string literals
//! that are persisted in a store.

pub mod literal;
pub mod value;

pub use literal::{decode, encode};
pub use value::{MetadataValue, DATETIME_FORMAT};
