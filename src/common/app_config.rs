// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<RowExpandConfig> = OnceLock::new();

pub const CONFIG_ENV: &str = "ROWEXPAND_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "rowexpand.toml";

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static RowExpandConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let cfg = RowExpandConfig::load_from_file(path.as_ref())?;
    let _ = CONFIG.set(cfg);
    CONFIG
        .get()
        .ok_or_else(|| anyhow!("config was not installed"))
}

pub fn init_from_env_or_default() -> Result<&'static RowExpandConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = config_path_from_env_or_default()?;
    init_from_path(path)
}

pub fn config() -> Result<&'static RowExpandConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV)
        && !p.trim().is_empty()
    {
        return Ok(PathBuf::from(p.trim()));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    Err(anyhow!(
        "missing config file: set ${CONFIG_ENV} or create ./{DEFAULT_CONFIG_FILE}"
    ))
}

#[derive(Clone, Debug, Deserialize)]
pub struct RowExpandConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression; takes precedence over `log_level`.
    /// Example: "rowexpand=debug,rowexpand::table_function=trace"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

impl RowExpandConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("parse toml: {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let cfg: RowExpandConfig = toml::from_str(s)?;
        if cfg.runtime.chunk_size == 0 {
            return Err(anyhow!("runtime.chunk_size must be positive"));
        }
        Ok(cfg)
    }

    /// Filter expression handed to the logging layer.
    pub fn effective_log_filter(&self) -> &str {
        self.log_filter
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(&self.log_level)
    }
}

impl Default for RowExpandConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            runtime: RuntimeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Row capacity of each output chunk when the query does not set a batch size.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    4096
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DebugConfig {
    /// Log every input row bound by table-function operators at debug level.
    #[serde(default)]
    pub table_function_trace: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = RowExpandConfig::parse("").unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.runtime.chunk_size, 4096);
        assert!(!cfg.debug.table_function_trace);
        assert_eq!(cfg.effective_log_filter(), "info");
    }

    #[test]
    fn log_filter_overrides_level() {
        let cfg = RowExpandConfig::parse(
            r#"
log_level = "warn"
log_filter = "rowexpand=trace"

[runtime]
chunk_size = 128

[debug]
table_function_trace = true
"#,
        )
        .unwrap();
        assert_eq!(cfg.effective_log_filter(), "rowexpand=trace");
        assert_eq!(cfg.runtime.chunk_size, 128);
        assert!(cfg.debug.table_function_trace);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = RowExpandConfig::parse("[runtime]\nchunk_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("chunk_size"), "err={err}");
    }
}
