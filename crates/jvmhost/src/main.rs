//! jvmhost
//!
//! Embeds a JVM and loads a jar bundle into it.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use jvmhost::{BundleRun, HostSettings, Overrides};

/// Embedded JVM host
#[derive(Parser, Debug)]
#[command(name = "jvmhost")]
#[command(about = "Load a jar bundle into an embedded JVM", long_about = None)]
struct Args {
    /// Path to the jar bundle
    #[arg(required_unless_present = "print_config")]
    bundle: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the JVM shared library
    #[arg(long)]
    libjvm: Option<PathBuf>,

    /// Java installation to search for the JVM library
    #[arg(long)]
    java_home: Option<PathBuf>,

    /// Extra JVM option, e.g. -O=-Xmx256m (repeatable)
    #[arg(short = 'O', long = "option", allow_hyphen_values = true)]
    options: Vec<String>,

    /// Class to resolve from the bundle (binary name)
    #[arg(long)]
    class: Option<String>,

    /// Leave the bundle loaded until the JVM is destroyed
    #[arg(long)]
    keep_loaded: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = HostSettings::load(args.config.as_deref())?;
    settings.apply(Overrides {
        library_path: args.libjvm,
        java_home: args.java_home,
        options: args.options,
    });

    if args.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(bundle) = args.bundle else {
        bail!("No bundle given");
    };

    info!("Starting jvmhost v{}", env!("CARGO_PKG_VERSION"));

    jvmhost::run(
        &settings,
        &BundleRun {
            bundle,
            class: args.class,
            keep_loaded: args.keep_loaded,
        },
    )
}
