//! Runtime creation settings.

use std::path::PathBuf;

use jni_sys::jint;
use serde::{Deserialize, Serialize};

/// `JNI_VERSION_10`, the interface version requested by default.
pub const JNI_VERSION_10: jint = 0x000a_0000;

/// How to create the embedded JVM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Explicit path to the JVM shared library. Takes precedence over
    /// `java_home`.
    #[serde(default)]
    pub library_path: Option<PathBuf>,
    /// Java installation to search for the shared library. Falls back to
    /// `JAVA_HOME` when unset.
    #[serde(default)]
    pub java_home: Option<PathBuf>,
    /// Requested interface version, encoded as `major << 16 | minor`.
    #[serde(default = "default_jni_version")]
    pub jni_version: jint,
    /// Option strings passed to the VM verbatim (`-Xmx256m`, `-Dkey=value`).
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub ignore_unrecognized: bool,
}

fn default_jni_version() -> jint {
    JNI_VERSION_10
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            java_home: None,
            jni_version: JNI_VERSION_10,
            options: Vec::new(),
            ignore_unrecognized: false,
        }
    }
}

impl RuntimeConfig {
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }
}
