//! Configuration schema for specgate
//!
//! Config lives at `.config/specgate/config.yaml` relative to the project root.
//! Every field is optional; command-line flags override it.

use serde::{Deserialize, Serialize};
use specgate_core::ValidationMode;

use crate::output::OutputFormat;

/// Default config location, relative to the project root
pub const CONFIG_PATH: &str = ".config/specgate/config.yaml";

/// Root configuration for specgate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Whether missing SHALL/MUST and missing scenarios are errors (`strict`)
    /// or warnings (`lenient`)
    pub mode: ValidationMode,

    /// Validate items concurrently
    pub parallel: bool,

    /// Output format when `--json` is not given
    pub format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Strict,
            parallel: true,
            format: OutputFormat::Text,
        }
    }
}
