use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{info, warn};

use crate::codec;
use crate::config::StoreSettings;
use crate::error::StoreError;
use crate::model::{Annotations, Attributes, TraceData};
use crate::schema::{self, Schema};

use super::container::{self, check_valid_suffix, Container, OriginGroup, TraceRecord};
use super::store::TraceStore;

const MISSING: &str = "<missing>";

/// Create a new store at `target` with default settings, replacing any file
/// that is already there.
///
/// `annotations[i]` and `data[i]` describe the same origin, with one data
/// matrix per trace in the same order.
pub fn populate(
    target: &Path,
    annotations: &[Annotations],
    data: &[Vec<TraceData>],
) -> Result<TraceStore, StoreError> {
    populate_with(target, annotations, data, StoreSettings::default())
}

pub fn populate_with(
    target: &Path,
    annotations: &[Annotations],
    data: &[Vec<TraceData>],
    settings: StoreSettings,
) -> Result<TraceStore, StoreError> {
    check_valid_suffix(target)?;
    if annotations.len() != data.len() {
        return Err(StoreError::InvalidInput(format!(
            "{} annotations but {} data lists",
            annotations.len(),
            data.len()
        )));
    }
    check_consistency(annotations)?;

    let origins = annotations
        .iter()
        .zip(data)
        .map(|(origin, traces)| build_group(origin, traces, settings.validate_on_write))
        .collect::<Result<Vec<_>, _>>()?;
    let traces: usize = origins.iter().map(|g| g.traces.len()).sum();

    container::create(target, &Container::new(origins), settings.pretty)?;
    info!(
        path = %target.display(),
        origins = annotations.len(),
        traces,
        "populated store"
    );
    TraceStore::open_with(target, settings)
}

/// Turn one origin's traces into a container group. With `validate` set,
/// every merged trace must also pass its schema.
fn build_group(
    origin: &Annotations,
    data: &[TraceData],
    validate: bool,
) -> Result<OriginGroup, StoreError> {
    if origin.traces.len() != data.len() {
        return Err(StoreError::InvalidInput(format!(
            "origin '{}' has {} traces but {} data matrices",
            origin.origin,
            origin.traces.len(),
            data.len()
        )));
    }
    let schema = Schema::for_attributes(&origin.attrs)?;
    let expected = expected_shape(&origin.attrs)?;

    let mut traces = BTreeMap::new();
    for (trace, samples) in origin.traces.iter().zip(data) {
        let mut merged = trace.clone();
        merged.extend_missing(&origin.attrs);
        if validate {
            schema.validate(&merged)?;
        }

        let raw_id = merged.get("id").unwrap_or_default();
        let id = codec::decode(raw_id)
            .as_int()
            .filter(|i| *i >= 0)
            .ok_or_else(|| StoreError::schema("id", raw_id, "expected a non-negative integer"))?
            .to_string();
        if samples.shape() != expected {
            return Err(StoreError::ShapeMismatch {
                expected,
                actual: samples.shape(),
            });
        }
        let record = TraceRecord::from_data(schema.filter(&merged), samples);
        if traces.insert(id.clone(), record).is_some() {
            return Err(StoreError::ConsistencyViolation {
                key: "id".into(),
                values: BTreeSet::from([format!("{}/{id}", origin.origin)]),
            });
        }
    }
    Ok(OriginGroup {
        origin: origin.origin.clone(),
        attrs: origin.attrs.clone(),
        traces,
    })
}

/// `(samples_pre_event + samples_post_event, channel count)` of an origin.
fn expected_shape(attrs: &Attributes) -> Result<(usize, usize), StoreError> {
    let count = |key: &str| -> Result<usize, StoreError> {
        let raw = attrs.get(key).unwrap_or_default();
        codec::decode(raw)
            .as_int()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| StoreError::schema(key, raw, "expected a non-negative integer"))
    };
    let channels = attrs
        .get_value("channel_labels")
        .and_then(|v| v.as_str_list().map(<[String]>::len))
        .ok_or_else(|| {
            let raw = attrs.get("channel_labels").unwrap_or_default();
            StoreError::schema("channel_labels", raw, "expected a list of strings")
        })?;
    Ok((count("samples_pre_event")? + count("samples_post_event")?, channels))
}

/// Merge existing stores into a new store at `target`.
pub fn merge(target: &Path, sources: &[impl AsRef<Path>]) -> Result<TraceStore, StoreError> {
    merge_with(target, sources, StoreSettings::default())
}

pub fn merge_with(
    target: &Path,
    sources: &[impl AsRef<Path>],
    settings: StoreSettings,
) -> Result<TraceStore, StoreError> {
    let mut annotations = Vec::new();
    let mut data = Vec::new();
    for source in sources {
        let store = TraceStore::open(source)?;
        for part in store.recover_parts()? {
            annotations.push(part.annotations);
            data.push(part.data);
        }
    }
    if target.exists() {
        warn!(path = %target.display(), "overwriting existing store");
    }
    info!(
        sources = sources.len(),
        origins = annotations.len(),
        "merging stores"
    );
    populate_with(target, &annotations, &data, settings)
}

/// Check that a set of origins can live in one store: origin names are
/// unique, there is exactly one readin and one readout, and every key that
/// must match has a single value.
pub fn check_consistency(origins: &[Annotations]) -> Result<(), StoreError> {
    if origins.is_empty() {
        return Err(StoreError::InvalidInput("no origins given".into()));
    }

    let mut seen = BTreeSet::new();
    for origin in origins {
        if !seen.insert(origin.origin.as_str()) {
            return Err(StoreError::ConsistencyViolation {
                key: "origin".into(),
                values: BTreeSet::from([origin.origin.clone()]),
            });
        }
    }

    // readin and readout are among the keys that must match
    for key in schema::must_match_fields().iter().map(|f| f.key) {
        let values: BTreeSet<String> = origins
            .iter()
            .map(|o| match o.attrs.get(key) {
                Some(raw) => codec::decode(raw).to_string(),
                None => MISSING.to_string(),
            })
            .collect();
        if values.len() != 1 {
            return Err(StoreError::ConsistencyViolation {
                key: key.to_string(),
                values,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::AnnotationBuilder;
    use crate::schema::{Readin, Readout};
    use tempfile::TempDir;

    /// A complete tms-cmep origin with one trace per id.
    pub(crate) fn cmep_annotations(origin: &str, ids: &[i64]) -> Annotations {
        let mut builder = AnnotationBuilder::new(Readin::Tms, Readout::Cmep, origin).unwrap();
        builder
            .set("channel_labels", vec!["EDC_L", "APB_R"])
            .unwrap()
            .set("samples_pre_event", 2)
            .unwrap()
            .set("samples_post_event", 3)
            .unwrap()
            .set("samplingrate", 1000)
            .unwrap()
            .set("subject", "S01")
            .unwrap()
            .set("filedate", "2019-05-02 13:24:01")
            .unwrap();
        for id in ids {
            let mut trace = Attributes::new();
            trace.set_value("id", *id).unwrap();
            trace.set_value("event_name", "Spike").unwrap();
            trace.set_value("event_sample", 1000 * id + 500).unwrap();
            trace.set_value("event_time", *id as f64 + 0.5).unwrap();
            trace.set_value("time_since_last_pulse_in_s", f64::INFINITY).unwrap();
            trace.set_value("examiner", "AB").unwrap();
            trace.set_value("channel_of_interest", "EDC_L").unwrap();
            builder.push_trace(trace);
        }
        builder.build()
    }

    /// A 5x2 trace filled with `value`.
    pub(crate) fn flat_data(value: f64) -> TraceData {
        TraceData::new(5, 2, vec![value; 10]).unwrap()
    }

    fn single_store(tmp: &TempDir, origin: &str) -> std::path::PathBuf {
        let path = tmp.path().join(format!("{origin}.tstore"));
        populate(
            &path,
            &[cmep_annotations(&format!("{origin}.xdf"), &[0, 1])],
            &[vec![flat_data(0.0), flat_data(1.0)]],
        )
        .unwrap();
        path
    }

    #[test]
    fn test_merge_two_stores() {
        let tmp = TempDir::new().unwrap();
        let a = single_store(&tmp, "A");
        let b = single_store(&tmp, "B");
        let merged = merge(&tmp.path().join("M.tstore"), &[a, b]).unwrap();

        assert_eq!(merged.len().unwrap(), 4);
        assert_eq!(merged.origins().unwrap(), ["A.xdf", "B.xdf"]);
        assert_eq!(merged.get_trace_attrs(0).unwrap().get("origin"), Some("A.xdf"));
        assert_eq!(merged.get_trace_attrs(3).unwrap().get("origin"), Some("B.xdf"));
        assert_eq!(merged.get_trace_attrs(3).unwrap().get("id"), Some("1"));
        assert_eq!(merged.get_trace_data(2).unwrap().values()[0], 0.0);
    }

    #[test]
    fn test_merge_keeps_trace_edits() {
        let tmp = TempDir::new().unwrap();
        let a = single_store(&tmp, "A");
        let store = TraceStore::open(&a).unwrap();
        let mut attrs = store.get_trace_attrs(1).unwrap();
        attrs.set_value("comment", "checked").unwrap();
        store.set_trace_attrs(1, &attrs).unwrap();

        let merged = merge(&tmp.path().join("M.tstore"), &[a]).unwrap();
        assert_eq!(merged.get_trace_attrs(1).unwrap().get("comment"), Some("checked"));
    }

    #[test]
    fn test_merge_accepts_lenient_edits() {
        let tmp = TempDir::new().unwrap();
        let a = single_store(&tmp, "A");
        let store = TraceStore::open(&a).unwrap();
        let mut attrs = store.get_trace_attrs(0).unwrap();
        attrs.insert("xyz_coords", "");
        store.set_trace_attrs(0, &attrs).unwrap();

        let merged = merge(&tmp.path().join("M.tstore"), &[a]).unwrap();
        assert_eq!(merged.len().unwrap(), 2);
        assert_eq!(merged.get_trace_attrs(0).unwrap().get("xyz_coords"), Some(""));
    }

    #[test]
    fn test_different_channel_labels_are_inconsistent() {
        let a = cmep_annotations("a.xdf", &[0]);
        let mut b = cmep_annotations("b.xdf", &[0]);
        b.attrs.set_value("channel_labels", vec!["FDI_R"]).unwrap();
        let err = check_consistency(&[a, b]).unwrap_err();
        match err {
            StoreError::ConsistencyViolation { key, values } => {
                assert_eq!(key, "channel_labels");
                assert_eq!(values.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_origin_is_inconsistent() {
        let a = cmep_annotations("a.xdf", &[0]);
        let err = check_consistency(&[a.clone(), a]).unwrap_err();
        assert!(matches!(err, StoreError::ConsistencyViolation { ref key, .. } if key == "origin"));
    }

    #[test]
    fn test_may_vary_keys_may_differ() {
        let a = cmep_annotations("a.xdf", &[0]);
        let mut b = cmep_annotations("b.xdf", &[0]);
        b.attrs.set_value("global_comment", "second session").unwrap();
        b.attrs.insert("filedate", "2020-01-01");
        check_consistency(&[a, b]).unwrap();
    }

    #[test]
    fn test_equivalent_literals_are_consistent() {
        let a = cmep_annotations("a.xdf", &[0]);
        let mut b = cmep_annotations("b.xdf", &[0]);
        b.attrs.insert("channel_labels", "[EDC_L, APB_R]");
        check_consistency(&[a, b]).unwrap();
    }

    #[test]
    fn test_populate_rejects_bad_input() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.tstore");
        let origin = cmep_annotations("a.xdf", &[0, 1]);

        let err = populate(&path, &[origin.clone()], &[vec![flat_data(0.0)]]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let wrong_shape = TraceData::zeros(4, 2);
        let err = populate(&path, &[origin.clone()], &[vec![flat_data(0.0), wrong_shape]]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ShapeMismatch {
                expected: (5, 2),
                actual: (4, 2)
            }
        ));

        let duplicate = cmep_annotations("a.xdf", &[3, 3]);
        let err = populate(&path, &[duplicate], &[vec![flat_data(0.0), flat_data(1.0)]]).unwrap_err();
        assert!(matches!(err, StoreError::ConsistencyViolation { ref key, .. } if key == "id"));

        let mut no_id = origin.clone();
        no_id.traces[0].remove("id");
        let err = populate(&path, &[no_id], &[vec![flat_data(0.0), flat_data(1.0)]]).unwrap_err();
        assert!(matches!(err, StoreError::SchemaViolation { ref key, .. } if key == "id"));

        let strict = StoreSettings {
            validate_on_write: true,
            ..StoreSettings::default()
        };
        let mut incomplete = origin;
        incomplete.traces[0].remove("pos_peak_latency_ms");
        let err = populate_with(&path, &[incomplete], &[vec![flat_data(0.0), flat_data(1.0)]], strict)
            .unwrap_err();
        assert!(matches!(err, StoreError::SchemaViolation { ref key, .. } if key == "pos_peak_latency_ms"));

        assert!(!path.exists());
    }

    #[test]
    fn test_trace_keys_win_over_origin_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.tstore");
        let mut origin = cmep_annotations("a.xdf", &[0]);
        origin.traces[0].insert("subject", "S02");
        let store = populate(&path, &[origin], &[vec![flat_data(0.0)]]).unwrap();
        assert_eq!(store.get_trace_attrs(0).unwrap().get("subject"), Some("S02"));
    }

    #[test]
    fn test_traces_are_keyed_by_id() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.tstore");
        let origin = cmep_annotations("a.xdf", &[10, 2, 1]);
        let data = vec![flat_data(10.0), flat_data(2.0), flat_data(1.0)];
        let store = populate(&path, &[origin], &[data]).unwrap();
        let firsts: Vec<f64> = (0..3)
            .map(|i| store.get_trace_data(i).unwrap().values()[0])
            .collect();
        assert_eq!(firsts, vec![1.0, 2.0, 10.0]);
    }
}
