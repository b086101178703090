use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracestore_core::StoreSettings;

use crate::output::format::format_summary;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct PeekArgs {
    /// Store file
    pub file: PathBuf,
}

pub fn run(args: &PeekArgs, settings: &StoreSettings, format: OutputFormat) -> Result<()> {
    let store = super::open_store(&args.file, settings)?;
    let summary = store
        .summary()
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    println!("{}", format_summary(&summary, format));
    Ok(())
}
