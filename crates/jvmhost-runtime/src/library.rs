//! Locating and opening the JVM shared library.

use std::ffi::{OsString, c_void};
use std::path::{Path, PathBuf};

use jni_sys::{JavaVM, jint};
use libloading::Library;

use crate::config::RuntimeConfig;
use crate::error::{HostError, Result};

/// Name of the runtime-construction entry point.
pub const CREATE_SYMBOL: &str = "JNI_CreateJavaVM";

/// `JNI_CreateJavaVM(JavaVM **pvm, void **penv, void *args)`.
pub(crate) type CreateJavaVmFn =
    unsafe extern "system" fn(*mut *mut JavaVM, *mut *mut c_void, *mut c_void) -> jint;

/// Shared-library locations relative to a Java home, in search order.
const HOME_LAYOUTS: &[&str] = &[
    "lib/server/libjvm.so",
    "lib/server/libjvm.dylib",
    "bin/server/jvm.dll",
    "jre/lib/server/libjvm.so",
    "jre/lib/amd64/server/libjvm.so",
    "jre/bin/server/jvm.dll",
];

/// Resolves which JVM shared library to open.
///
/// Resolution order:
/// 1. An explicit library path
/// 2. A configured Java home
/// 3. The `JAVA_HOME` environment variable
#[derive(Debug, Clone, Default)]
pub struct LibraryLocator {
    library_path: Option<PathBuf>,
    java_home: Option<PathBuf>,
}

impl LibraryLocator {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            library_path: config.library_path.clone(),
            java_home: config.java_home.clone(),
        }
    }

    pub fn resolve(&self) -> Result<PathBuf> {
        self.resolve_with(std::env::var_os("JAVA_HOME"))
    }

    fn resolve_with(&self, env_home: Option<OsString>) -> Result<PathBuf> {
        if let Some(path) = &self.library_path {
            return Ok(path.clone());
        }

        let home = self
            .java_home
            .clone()
            .or_else(|| env_home.filter(|h| !h.is_empty()).map(PathBuf::from))
            .ok_or(HostError::LibraryUnresolved)?;

        search_home(&home)
    }
}

fn search_home(home: &Path) -> Result<PathBuf> {
    for layout in HOME_LAYOUTS {
        let candidate = home.join(layout);
        if candidate.is_file() {
            tracing::debug!("Found JVM library at {}", candidate.display());
            return Ok(candidate);
        }
    }
    Err(HostError::NoLibraryUnderHome {
        java_home: home.to_path_buf(),
    })
}

/// What keeps `create` callable.
#[allow(dead_code)]
enum EntrySource {
    Shared(Library),
    /// An in-process entry point; the marker lets tests observe whether the
    /// source was released.
    #[cfg(test)]
    Injected(std::rc::Rc<()>),
}

/// An opened JVM library with its creation entry point resolved.
pub(crate) struct JvmLibrary {
    path: PathBuf,
    create: CreateJavaVmFn,
    _source: EntrySource,
}

impl JvmLibrary {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        // SAFETY: Loading libjvm runs its initializers; nothing else is known
        // to be unsound about loading it into the host.
        let library = unsafe { Library::new(path) }.map_err(|source| {
            HostError::LibraryNotFound {
                path: path.to_path_buf(),
                source,
            }
        })?;

        // SAFETY: The signature matches the JNI invocation API contract.
        let create = unsafe {
            library
                .get::<CreateJavaVmFn>(CREATE_SYMBOL.as_bytes())
                .map(|symbol| *symbol)
        }
        .map_err(|source| HostError::SymbolNotFound {
            symbol: CREATE_SYMBOL,
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("Resolved {} in {}", CREATE_SYMBOL, path.display());

        Ok(Self {
            path: path.to_path_buf(),
            create,
            _source: EntrySource::Shared(library),
        })
    }

    #[cfg(test)]
    pub(crate) fn injected(create: CreateJavaVmFn, marker: std::rc::Rc<()>) -> Self {
        Self {
            path: PathBuf::from("<injected>"),
            create,
            _source: EntrySource::Injected(marker),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn create_fn(&self) -> CreateJavaVmFn {
        self.create
    }
}
