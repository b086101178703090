use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracestore_core::StoreSettings;

use crate::output::format::{format_attributes, format_data};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct ShowArgs {
    /// Store file
    pub file: PathBuf,

    /// Global trace index
    #[arg(allow_hyphen_values = true)]
    pub index: String,

    /// Also print the sample matrix
    #[arg(long)]
    pub data: bool,
}

pub fn run(args: &ShowArgs, settings: &StoreSettings, format: OutputFormat) -> Result<()> {
    let store = super::open_store(&args.file, settings)?;
    let index = store.parse_index(&args.index)?;
    let attrs = store
        .get_trace_attrs(index)
        .with_context(|| format!("Failed to read trace {index}"))?;
    println!("{}", format_attributes(&attrs, format));

    if args.data {
        let data = store
            .get_trace_data(index)
            .with_context(|| format!("Failed to read samples of trace {index}"))?;
        println!("{}", format_data(&data, format));
    }
    Ok(())
}
