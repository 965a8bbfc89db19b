//! Generator configuration loaded from TOML. Command-line flags override
//! whatever the file sets.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{GenError, GenResult};

/// Provenance tag stamped into `_meta.gen` when the file sets none.
pub const DEFAULT_SOURCE: &str = "tvx-gen";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Root directory vectors are written under.
    pub output_dir: PathBuf,

    /// Worker threads; 0 uses every available CPU.
    pub parallelism: usize,

    /// Stop starting new jobs after the first failure.
    pub fail_fast: bool,

    /// Indent emitted JSON.
    pub pretty: bool,

    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,

    pub source: String,

    pub version: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            output_dir: PathBuf::from("./corpus"),
            parallelism: 0,
            fail_fast: false,
            pretty: true,
            log_level: "info".to_string(),
            source: DEFAULT_SOURCE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Worker count with 0 resolved to the host's parallelism.
    pub fn workers(&self) -> usize {
        match self.parallelism {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

/// Load config from a TOML file path. Missing keys keep their defaults.
pub fn load_from_file(path: impl AsRef<Path>) -> GenResult<GeneratorConfig> {
    let p = path.as_ref();
    let s = fs::read_to_string(p).map_err(|e| GenError::io(p, e))?;
    let cfg: GeneratorConfig = toml::from_str(&s)?;
    Ok(cfg)
}
