//! File-backed storage for stimulus-aligned electrophysiological traces.
//!
//! A store groups traces by the recording ("origin") they came from and
//! exposes them under one flat, zero-based index. Metadata is kept as
//! canonical string literals (see [`codec`]) and checked against the schema
//! of the recording's readin and readout (see [`schema`]).

pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod schema;
pub mod storage;

pub use codec::MetadataValue;
pub use config::StoreSettings;
pub use error::StoreError;
pub use model::{
    AnnotationBuilder, Annotations, Attributes, OriginAttributes, OriginParts, Provenance,
    TraceAttributes, TraceData,
};
pub use schema::{Readin, Readout, Rio, Schema};
pub use storage::{check_consistency, merge, populate, TraceStore};
