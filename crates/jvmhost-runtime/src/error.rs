//! Error types for the embedded JVM host.

use std::fmt;
use std::path::PathBuf;

use jni_sys::jint;

pub type Result<T, E = HostError> = std::result::Result<T, E>;

/// Errors that can occur while driving the embedded runtime.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("No JVM library configured and JAVA_HOME is not set")]
    LibraryUnresolved,

    #[error("Could not load the JVM library at {}: {source}", .path.display())]
    LibraryNotFound {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("No JVM library found under Java home {}", .java_home.display())]
    NoLibraryUnderHome { java_home: PathBuf },

    #[error("Symbol `{symbol}` not found in {}: {source}", .path.display())]
    SymbolNotFound {
        symbol: &'static str,
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("A JVM has already been created in this process")]
    AlreadyCreated,

    #[error("Invalid JVM option {0:?}: contains a NUL byte")]
    InvalidOption(String),

    #[error("Failed to create the JVM: {status}")]
    CreateFailed { status: JniStatus },

    #[error("Could not {step}")]
    Lookup {
        step: Step,
        /// Whether a pending Java exception was drained after the failure.
        exception: bool,
    },

    #[error("Bundle path {0:?} cannot be passed to the JVM")]
    InvalidPath(PathBuf),

    #[error("Invalid class name {0:?}: contains a NUL byte")]
    InvalidClassName(String),

    #[error("No bundle is loaded")]
    NoBundleLoaded,

    #[error("Failed to destroy the JVM: {status}")]
    DestroyFailed { status: JniStatus },
}

/// Coarse failure category, for callers that branch on what went wrong
/// rather than on the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The shared library could not be located or opened.
    Library,
    /// The creation entry point is missing from the library.
    Symbol,
    /// The single-instance slot is already taken.
    Instance,
    /// The runtime rejected its creation arguments.
    Create,
    /// A class, method, or object could not be obtained inside the runtime.
    Lookup,
    /// The operation is not valid in the host's current state.
    State,
    /// Caller input could not be passed across the boundary.
    Input,
    /// The runtime failed to shut down.
    Destroy,
}

impl HostError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HostError::LibraryUnresolved
            | HostError::LibraryNotFound { .. }
            | HostError::NoLibraryUnderHome { .. } => ErrorKind::Library,
            HostError::SymbolNotFound { .. } => ErrorKind::Symbol,
            HostError::AlreadyCreated => ErrorKind::Instance,
            HostError::CreateFailed { .. } => ErrorKind::Create,
            HostError::Lookup { .. } => ErrorKind::Lookup,
            HostError::NoBundleLoaded => ErrorKind::State,
            HostError::InvalidOption(_)
            | HostError::InvalidPath(_)
            | HostError::InvalidClassName(_) => ErrorKind::Input,
            HostError::DestroyFailed { .. } => ErrorKind::Destroy,
        }
    }

    pub(crate) fn lookup(step: Step, exception: bool) -> Self {
        HostError::Lookup { step, exception }
    }
}

/// A step inside the runtime that can fail independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    LoaderClass,
    LoaderConstructor,
    UrlClass,
    UrlConstructor,
    UrlString,
    UrlObject,
    UrlArray,
    LoaderInstance,
    LoaderGlobalRef,
    ClassLoaderClass,
    LoadClassMethod,
    ClassName,
    LoadedClass,
    ClassGlobalRef,
    SystemClass,
    GcMethod,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Step::LoaderClass => "find java/net/URLClassLoader class",
            Step::LoaderConstructor => "find URLClassLoader constructor",
            Step::UrlClass => "find java/net/URL class",
            Step::UrlConstructor => "find URL constructor",
            Step::UrlString => "create URL string for bundle",
            Step::UrlObject => "create URL object for bundle",
            Step::UrlArray => "create URL array",
            Step::LoaderInstance => "create URLClassLoader instance",
            Step::LoaderGlobalRef => "promote class loader to a global reference",
            Step::ClassLoaderClass => "find java/lang/ClassLoader class",
            Step::LoadClassMethod => "find ClassLoader.loadClass method",
            Step::ClassName => "create class name string",
            Step::LoadedClass => "load class from bundle",
            Step::ClassGlobalRef => "promote loaded class to a global reference",
            Step::SystemClass => "find java/lang/System class",
            Step::GcMethod => "find System.gc() method",
        };
        f.write_str(text)
    }
}

/// Status code returned by the invocation interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JniStatus {
    Ok,
    Error,
    Detached,
    Version,
    NoMemory,
    Exists,
    Invalid,
    Other(jint),
}

impl From<jint> for JniStatus {
    fn from(code: jint) -> Self {
        match code {
            jni_sys::JNI_OK => JniStatus::Ok,
            jni_sys::JNI_ERR => JniStatus::Error,
            jni_sys::JNI_EDETACHED => JniStatus::Detached,
            jni_sys::JNI_EVERSION => JniStatus::Version,
            jni_sys::JNI_ENOMEM => JniStatus::NoMemory,
            jni_sys::JNI_EEXIST => JniStatus::Exists,
            jni_sys::JNI_EINVAL => JniStatus::Invalid,
            other => JniStatus::Other(other),
        }
    }
}

impl fmt::Display for JniStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JniStatus::Ok => f.write_str("ok"),
            JniStatus::Error => f.write_str("unknown error (JNI_ERR)"),
            JniStatus::Detached => f.write_str("thread detached (JNI_EDETACHED)"),
            JniStatus::Version => f.write_str("unsupported version (JNI_EVERSION)"),
            JniStatus::NoMemory => f.write_str("not enough memory (JNI_ENOMEM)"),
            JniStatus::Exists => f.write_str("VM already created (JNI_EEXIST)"),
            JniStatus::Invalid => f.write_str("invalid arguments (JNI_EINVAL)"),
            JniStatus::Other(code) => write!(f, "status {code}"),
        }
    }
}
