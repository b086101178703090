use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracestore_core::{Schema, StoreSettings};

use crate::output::format::{format_validation, ValidationReport};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct ValidateArgs {
    /// Store file
    pub file: PathBuf,
}

pub fn run(args: &ValidateArgs, settings: &StoreSettings, format: OutputFormat) -> Result<()> {
    let store = super::open_store(&args.file, settings)?;
    let mut report = ValidationReport::default();
    for (index, item) in store.iter()?.enumerate() {
        let (_, attrs) = item?;
        report.checked += 1;
        if let Err(e) = Schema::for_attributes(&attrs).and_then(|schema| schema.validate(&attrs)) {
            report.failures.push((index, e.to_string()));
        }
    }

    println!("{}", format_validation(&report, format));
    if !report.failures.is_empty() {
        anyhow::bail!(
            "{} of {} traces failed validation",
            report.failures.len(),
            report.checked
        );
    }
    Ok(())
}
