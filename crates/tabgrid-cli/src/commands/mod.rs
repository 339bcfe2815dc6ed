//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod extract;
pub mod output;
pub mod serve;

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::debug;

use tabgrid_core::{GridStrategy, TabgridConfig};

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabgrid")
        .join("config.json")
}

/// Load the configuration from `path`, else from the default location if it
/// exists, else the built-in defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<TabgridConfig> {
    if let Some(path) = path {
        return Ok(TabgridConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        return Ok(TabgridConfig::from_file(&default_path)?);
    }

    Ok(TabgridConfig::default())
}

/// Grid detection strategy selectable on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    /// Line intersections define the grid axes
    Intersections,
    /// Cell interiors are traced as contours
    Contours,
}

impl From<StrategyArg> for GridStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Intersections => GridStrategy::Intersections,
            StrategyArg::Contours => GridStrategy::Contours,
        }
    }
}
