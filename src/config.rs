//! Extraction settings loaded from TOML.
//!
//! ```toml
//! periods = ["AM", "PM"]
//! emit = "json"
//! include_headers = false
//! ```
//!
//! Every key is optional. Command-line flags override file values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TmcError, TmcResult};
use crate::export::Emit;
use crate::model::{PeriodFilter, PeriodLabel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Periods to populate. Unknown labels fail the parse.
    pub periods: Vec<PeriodLabel>,
    pub emit: Emit,
    pub include_headers: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            periods: PeriodLabel::PERIODS.to_vec(),
            emit: Emit::default(),
            include_headers: true,
        }
    }
}

impl ExtractConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> TmcResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TmcError::ConfigRead {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse TOML text that did not come from a file.
    pub fn from_toml_str(content: &str) -> TmcResult<Self> {
        Self::parse(content, "(inline)")
    }

    fn parse(content: &str, origin: &str) -> TmcResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| TmcError::ConfigParse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        if config.periods.contains(&PeriodLabel::Unclassified) {
            return Err(TmcError::InvalidPeriod {
                label: PeriodLabel::Unclassified.to_string(),
            });
        }
        Ok(config)
    }

    pub fn filter(&self) -> PeriodFilter {
        PeriodFilter::only(&self.periods)
    }
}
