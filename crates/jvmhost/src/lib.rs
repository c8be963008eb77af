//! jvmhost
//!
//! Drives one embedded JVM through a bundle's lifecycle: create the runtime,
//! load the bundle, optionally resolve a class from it, unload, destroy.

pub mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use jvmhost_runtime::RuntimeHost;

pub use config::{HostSettings, Overrides};

/// What to do with the bundle once the runtime is up.
#[derive(Debug, Clone)]
pub struct BundleRun {
    pub bundle: PathBuf,
    /// Binary name of a class to resolve through the bundle's loader
    pub class: Option<String>,
    /// Skip the unload step and let teardown release the loader
    pub keep_loaded: bool,
}

pub fn run(settings: &HostSettings, job: &BundleRun) -> Result<()> {
    let mut host = RuntimeHost::initialize(&settings.runtime).context("Failed to start the JVM")?;
    info!("Runtime ready (JNI {})", host.version());

    host.load_bundle(&job.bundle)
        .with_context(|| format!("Failed to load bundle {}", job.bundle.display()))?;

    if let Some(class) = &job.class {
        host.load_class(class)
            .with_context(|| format!("Failed to load class {class}"))?;
        info!("Resolved class {}", class);
    }

    if !job.keep_loaded {
        host.unload_bundle().context("Failed to unload bundle")?;
    }

    host.destroy().context("Failed to shut down the JVM")?;
    Ok(())
}
