pub mod merge;
pub mod peek;
pub mod set;
pub mod show;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracestore_core::{StoreSettings, TraceStore};

#[derive(Subcommand)]
pub enum Commands {
    /// Print the origins of a store and their attributes
    Peek(peek::PeekArgs),
    /// Merge several stores into a new one
    Merge(merge::MergeArgs),
    /// Show the attributes (and optionally samples) of one trace
    Show(show::ShowArgs),
    /// Set one attribute of one trace
    Set(set::SetArgs),
    /// Check every trace against its schema
    Validate(validate::ValidateArgs),
}

pub(crate) fn open_store(path: &Path, settings: &StoreSettings) -> Result<TraceStore> {
    TraceStore::open_with(path, settings.clone())
        .with_context(|| format!("Failed to open store {}", path.display()))
}
