//! JVM embedding runtime
//!
//! Loads a JVM shared library at runtime, creates one JVM inside the host
//! process through the JNI invocation API, and loads jar bundles into it
//! behind their own `URLClassLoader`.
//!
//! # Architecture
//!
//! - `RuntimeHost` owns the one runtime a process may create; dropping it
//!   destroys the runtime
//! - Every JNI reference the host creates is held by a guard that deletes it
//!   on drop
//! - Failures come back as `HostError`, with `ErrorKind` for branching
//! - The host is bound to the thread that created it

mod config;
mod error;
mod host;
mod interface;
mod library;
mod refs;

#[cfg(test)]
mod testing;

pub use config::{JNI_VERSION_10, RuntimeConfig};
pub use error::{ErrorKind, HostError, JniStatus, Result, Step};
pub use host::{RuntimeHost, RuntimeVersion};
pub use library::{CREATE_SYMBOL, LibraryLocator};
pub use refs::GlobalRef;
