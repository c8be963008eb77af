//! Host Configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `JVMHOST_` environment variables (`__` separates nested keys, e.g.
//! `JVMHOST_RUNTIME__JAVA_HOME`), then command-line overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use jvmhost_runtime::RuntimeConfig;

/// Host settings (jvmhost.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Fallback tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_log_filter() -> String {
    "jvmhost=info,jvmhost_runtime=info".to_string()
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Values given on the command line, applied last.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub library_path: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub options: Vec<String>,
}

impl HostSettings {
    /// Load settings from defaults, `file` (if given) and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::figment(file)?
            .merge(Env::prefixed("JVMHOST_").split("__"))
            .extract()
            .context("Invalid host configuration")
    }

    fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(HostSettings::default()));
        if let Some(path) = file {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        Ok(figment)
    }

    /// Render the effective settings in config-file form.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(path) = overrides.library_path {
            self.runtime.library_path = Some(path);
        }
        if let Some(home) = overrides.java_home {
            self.runtime.java_home = Some(home);
        }
        self.runtime.options.extend(overrides.options);
    }
}
