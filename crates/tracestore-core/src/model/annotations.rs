use crate::codec::MetadataValue;
use crate::error::StoreError;
use crate::schema::{Readin, Readout, Rio, Schema, SCHEMA_VERSION};

use super::attributes::{Attributes, OriginAttributes};

/// Annotations of one source recording, as produced by an importer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotations {
    pub origin: String,
    pub attrs: OriginAttributes,
    pub traces: Vec<Attributes>,
}

impl Annotations {
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

/// Assembles [`Annotations`] for a rio, completing traces with the schema's
/// default values.
#[derive(Debug, Clone)]
pub struct AnnotationBuilder {
    schema: Schema,
    annotations: Annotations,
}

impl AnnotationBuilder {
    pub fn new(readin: Readin, readout: Readout, origin: impl Into<String>) -> Result<Self, StoreError> {
        let rio = Rio::new(readin, readout)?;
        let mut attrs = OriginAttributes::new();
        attrs.insert("readin", readin.as_str());
        attrs.insert("readout", readout.as_str());
        attrs.insert("version", SCHEMA_VERSION);
        attrs.insert("global_comment", "");
        attrs.insert("history", "");
        Ok(Self {
            schema: Schema::for_rio(rio),
            annotations: Annotations {
                origin: origin.into(),
                attrs,
                traces: Vec::new(),
            },
        })
    }

    /// Set an origin attribute.
    pub fn set(&mut self, key: &str, value: impl Into<MetadataValue>) -> Result<&mut Self, StoreError> {
        self.annotations.attrs.set_value(key, value)?;
        Ok(self)
    }

    /// Append a trace, filling every schema key it leaves out that has a
    /// default.
    pub fn push_trace(&mut self, mut trace: Attributes) -> &mut Self {
        for f in self.schema.trace_fields() {
            if trace.contains_key(f.key) {
                continue;
            }
            if let Some(default) = f.check.default_literal() {
                trace.insert(f.key, default);
            }
        }
        self.annotations.traces.push(trace);
        self
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn build(self) -> Annotations {
        self.annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_prefills_origin_attributes() {
        let mut builder = AnnotationBuilder::new(Readin::Tms, Readout::Cmep, "run1.xdf").unwrap();
        builder
            .set("subject", "S01")
            .unwrap()
            .set("samplingrate", 1000)
            .unwrap()
            .set("channel_labels", vec!["EDC_L", "APB_R"])
            .unwrap();
        let annotations = builder.build();
        assert_eq!(annotations.origin, "run1.xdf");
        assert_eq!(annotations.attrs.get("readout"), Some("cmep"));
        assert_eq!(annotations.attrs.get("version"), Some(SCHEMA_VERSION));
        assert_eq!(annotations.attrs.get("channel_labels"), Some("['EDC_L', 'APB_R']"));
        assert!(annotations.is_empty());
    }

    #[test]
    fn test_push_trace_fills_defaults_only_where_missing() {
        let mut builder = AnnotationBuilder::new(Readin::Tms, Readout::Cmep, "run1.xdf").unwrap();
        let trace: Attributes = [("id", "0"), ("comment", "late pulse")].into_iter().collect();
        builder.push_trace(trace);
        let annotations = builder.build();
        let trace = &annotations.traces[0];
        assert_eq!(trace.get("comment"), Some("late pulse"));
        assert_eq!(trace.get("reject"), Some("false"));
        assert_eq!(trace.get("onset_shift"), Some("0"));
        assert_eq!(trace.get("neg_peak_magnitude_uv"), Some("nan"));
        assert_eq!(trace.get("xyz_coords"), Some("[nan, nan, nan]"));
        assert!(!trace.contains_key("event_sample"));
    }

    #[test]
    fn test_builder_rejects_unsupported_rio() {
        let err = AnnotationBuilder::new(Readin::Pes, Readout::Imep, "x").unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedReadout(_)));
    }
}
