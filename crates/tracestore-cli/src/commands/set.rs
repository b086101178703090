use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracestore_core::{codec, Schema, StoreSettings};
use tracing::{debug, info};

#[derive(Args)]
pub struct SetArgs {
    /// Store file
    pub file: PathBuf,

    /// Global trace index
    #[arg(allow_hyphen_values = true)]
    pub index: String,

    /// Attribute key
    pub key: String,

    /// New value, written as a literal (e.g. `12`, `nan`, `true`, `[1.0, 2.0, 3.0]`)
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

pub fn run(args: &SetArgs, settings: &StoreSettings) -> Result<()> {
    let store = super::open_store(&args.file, settings)?;
    let index = store.parse_index(&args.index)?;
    let mut attrs = store
        .get_trace_attrs(index)
        .with_context(|| format!("Failed to read trace {index}"))?;

    let schema = Schema::for_attributes(&attrs)?;
    if !schema.is_valid_key(&args.key) {
        anyhow::bail!(
            "'{}' is not an attribute of {} traces",
            args.key,
            schema.rio()
        );
    }

    // Re-encode so equivalent spellings are stored canonically.
    let value = codec::decode(&args.value);
    debug!(key = %args.key, value = ?value, "decoded attribute value");
    attrs
        .set_value(args.key.as_str(), value)
        .with_context(|| format!("Failed to encode '{}'", args.value))?;
    store
        .set_trace_attrs(index, &attrs)
        .with_context(|| format!("Failed to write trace {index}"))?;
    info!(path = %args.file.display(), index, key = %args.key, "set trace attribute");

    println!(
        "Set {} = {} on trace {index}",
        args.key,
        attrs.get(&args.key).unwrap_or_default()
    );
    Ok(())
}
