use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracestore_core::storage::merge_with;
use tracestore_core::StoreSettings;
use tracing::info;

#[derive(Args)]
pub struct MergeArgs {
    /// Store to create (overwritten if it exists)
    #[arg(long)]
    pub to: PathBuf,

    /// Stores to merge, in order
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
}

pub fn run(args: &MergeArgs, settings: &StoreSettings) -> Result<()> {
    let store = merge_with(&args.to, args.sources.as_slice(), settings.clone())
        .with_context(|| format!("Failed to merge into {}", args.to.display()))?;
    let origins = store.origins()?;
    info!(path = %store.path().display(), sources = args.sources.len(), "merge finished");
    println!(
        "Merged {} traces from {} origins into {}",
        store.len()?,
        origins.len(),
        store.path().display()
    );
    Ok(())
}
