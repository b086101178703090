use serde_json::{json, Map, Value};
use tracestore_core::codec::{self, MetadataValue};
use tracestore_core::storage::StoreSummary;
use tracestore_core::{Attributes, TraceData};

use super::OutputFormat;

/// Outcome of `tracestore validate`.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub checked: usize,
    pub failures: Vec<(usize, String)>,
}

pub fn format_summary(summary: &StoreSummary, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let origins: Vec<Value> = summary
                .origins
                .iter()
                .map(|o| {
                    json!({
                        "origin": o.origin,
                        "traces": o.traces,
                        "attrs": decoded(&o.attrs),
                    })
                })
                .collect();
            let doc = json!({
                "path": summary.path.display().to_string(),
                "traces": summary.total_traces(),
                "origins": origins,
            });
            serde_json::to_string_pretty(&doc).unwrap_or_default()
        }
        OutputFormat::Text => summary.to_string(),
    }
}

pub fn format_attributes(attrs: &Attributes, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(&decoded(attrs)).unwrap_or_default(),
        OutputFormat::Text => {
            let width = attrs.keys().map(str::len).max().unwrap_or(0);
            let mut out = String::new();
            for (key, value) in attrs.iter() {
                out.push_str(&format!("{key:>width$} : {value}\n"));
            }
            out.trim_end().to_string()
        }
    }
}

pub fn format_data(data: &TraceData, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let rows: Vec<Value> = (0..data.samples())
                .filter_map(|s| data.row(s))
                .map(|row| Value::Array(row.iter().map(|v| float_json(*v)).collect()))
                .collect();
            let doc = json!({
                "samples": data.samples(),
                "channels": data.channels(),
                "values": rows,
            });
            serde_json::to_string_pretty(&doc).unwrap_or_default()
        }
        OutputFormat::Text => {
            let (samples, channels) = data.shape();
            let mut out = format!("--- Samples ({samples} x {channels}) ---\n");
            for row in (0..samples).filter_map(|s| data.row(s)) {
                let cells: Vec<String> = row.iter().map(|v| codec::literal::format_float(*v)).collect();
                out.push_str(&cells.join("\t"));
                out.push('\n');
            }
            out.trim_end().to_string()
        }
    }
}

pub fn format_validation(report: &ValidationReport, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let failures: Vec<Value> = report
                .failures
                .iter()
                .map(|(index, error)| json!({ "index": index, "error": error }))
                .collect();
            let doc = json!({
                "checked": report.checked,
                "valid": report.checked - report.failures.len(),
                "failures": failures,
            });
            serde_json::to_string_pretty(&doc).unwrap_or_default()
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for (index, error) in &report.failures {
                out.push_str(&format!("\u{2717} trace {index}: {error}\n"));
            }
            out.push_str(&format!(
                "{} of {} traces valid",
                report.checked - report.failures.len(),
                report.checked
            ));
            out
        }
    }
}

/// Attributes as a JSON object of decoded values.
fn decoded(attrs: &Attributes) -> Value {
    let map: Map<String, Value> = attrs
        .iter()
        .map(|(key, raw)| (key.to_string(), value_json(&codec::decode(raw))))
        .collect();
    Value::Object(map)
}

fn value_json(value: &MetadataValue) -> Value {
    match value {
        MetadataValue::Str(s) => Value::String(s.clone()),
        MetadataValue::Int(i) => Value::from(*i),
        MetadataValue::Float(f) => float_json(*f),
        MetadataValue::Bool(b) => Value::Bool(*b),
        MetadataValue::StrList(items) => Value::from(items.clone()),
        MetadataValue::FloatList(values) => {
            Value::Array(values.iter().map(|v| float_json(*v)).collect())
        }
    }
}

/// JSON has no NaN or infinity; those are written as their literal tokens.
fn float_json(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(codec::literal::format_float(f)))
}
