//! Farm command line tools
//!
//! Argument definitions and run functions live here so the binaries stay
//! thin and the behavior can be tested without spawning processes.

pub mod farmuser;
pub mod submit;

use anyhow::Context;
use farm_core::FarmConfig;
use std::path::Path;

/// Load configuration and install logging
pub(crate) fn setup(config: Option<&Path>) -> anyhow::Result<FarmConfig> {
    let config = FarmConfig::load(config).context("loading farm configuration")?;
    farm_core::logging::init(&config.log);
    Ok(config)
}
