pub mod catalog;
pub mod config;
pub mod counters;
pub mod serve;

use anyhow::Context;
use brsr_core::config::Config;
use std::path::Path;

pub(crate) fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("failed to load config {}", path.display()))
}
