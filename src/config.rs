// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the STRATA project (Staged Tensor Runtime And Toolchain Assembly).

//! Tool configuration read from `Strata.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::backends::{
    select_backends, BackendError, BackendInfo, MultiResults, DEFAULT_ATOL, DEFAULT_RTOL,
};
use crate::hal::dylib::DyLibDriver;
use crate::pipeline::{LoweringOptions, LoweringTarget};

/// File name searched for by [`discover`].
pub const CONFIG_FILE: &str = "Strata.toml";

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    #[serde(default)]
    pub lowering: LoweringConfig,
    #[serde(default)]
    pub hal: HalConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoweringConfig {
    #[serde(default)]
    pub target: LoweringTarget,
    /// Reject import tables that lack any check import before converting.
    #[serde(default)]
    pub strict_imports: bool,
}

impl LoweringConfig {
    pub fn options(&self) -> LoweringOptions {
        LoweringOptions {
            target: self.target,
            strict_imports: self.strict_imports,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HalConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
        }
    }
}

fn default_driver() -> String {
    DyLibDriver::NAME.to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BackendsConfig {
    /// Comma-delimited backend names; all backends when absent.
    #[serde(default)]
    pub targets: Option<String>,
    #[serde(default = "default_rtol")]
    pub rtol: f64,
    #[serde(default = "default_atol")]
    pub atol: f64,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            targets: None,
            rtol: default_rtol(),
            atol: default_atol(),
        }
    }
}

impl BackendsConfig {
    /// Backends named by `targets_override`, else by the configured targets.
    pub fn select(
        &self,
        targets_override: Option<&str>,
    ) -> Result<Vec<&'static BackendInfo>, BackendError> {
        select_backends(targets_override.or(self.targets.as_deref()))
    }

    /// Compares per-backend results using the configured tolerances.
    pub fn compare<'r>(
        &self,
        results: &'r MultiResults,
    ) -> Result<&'r MultiResults, BackendError> {
        results.assert_all_close_and_equal(self.rtol, self.atol)
    }
}

fn default_rtol() -> f64 {
    DEFAULT_RTOL
}

fn default_atol() -> f64 {
    DEFAULT_ATOL
}

impl StrataConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse strata configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Nearest `Strata.toml` in `start` or any of its parents.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

/// Loads the nearest configuration, falling back to defaults when none exists.
pub fn discover(start: &Path) -> Result<StrataConfig> {
    match find_config(start) {
        Some(path) => StrataConfig::load(&path),
        None => Ok(StrataConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = StrataConfig::from_toml_str("").expect("parse");
        assert_eq!(config, StrataConfig::default());
        assert_eq!(config.hal.driver, "dylib");
        assert_eq!(config.lowering.target, LoweringTarget::Vm);
        assert_eq!(config.backends.rtol, DEFAULT_RTOL);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = StrataConfig::from_toml_str("[lowering]\nstrict = true\n").unwrap_err();
        assert!(format!("{err:#}").contains("strict"), "{err:#}");
    }
}
