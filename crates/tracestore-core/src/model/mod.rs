pub mod annotations;
pub mod attributes;
pub mod trace;

pub use annotations::{AnnotationBuilder, Annotations};
pub use attributes::{Attributes, OriginAttributes, Provenance, TraceAttributes};
pub use trace::TraceData;

/// Everything needed to re-populate one origin group: its annotations and
/// the sample data of each trace, in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginParts {
    pub annotations: Annotations,
    pub data: Vec<TraceData>,
}
