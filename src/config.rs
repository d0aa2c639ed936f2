//! Settings shared by the command line programs.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `CMIP5_` (e.g. `CMIP5_ESG_NODE`).
//! An example TOML file:
//!
//! ```toml
//! esg_node = "https://esgf-node.llnl.gov/"
//! cdo_options = "-f nc4 -z zip"
//! skip_tables = ["fx", "Ofx"]
//! ```
use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, esg::DEFAULT_ESG_NODE};

pub const ENV_PREFIX: &str = "CMIP5_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the ESGF index node to build queries against
    pub esg_node: String,
    /// Options passed to CDO before the operator
    pub cdo_options: String,
    /// MIP tables whose files are never clustered for concatenation
    pub skip_tables: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            esg_node: DEFAULT_ESG_NODE.to_string(),
            cdo_options: "-f nc4".to_string(),
            skip_tables: vec!["fx".to_string()],
        }
    }
}

impl Config {
    fn base() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    /// Load the configuration, reading `file` if given and then applying
    /// any `CMIP5_` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Self::base();
        if let Some(file) = file {
            if !file.exists() {
                return Err(ConfigError::MissingFile(file.to_path_buf()));
            }
            figment = figment.merge(Toml::file(file));
        }

        let config = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        Ok(config)
    }

    /// Load the configuration from a TOML string, ignoring the environment.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config = Self::base().merge(Toml::string(s)).extract()?;
        Ok(config)
    }
}
