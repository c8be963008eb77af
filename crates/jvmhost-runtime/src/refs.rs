//! Scoped ownership of runtime references.
//!
//! JNI hands out local references that live until explicitly deleted (the
//! host never returns to Java, so no frame pops them) and global references
//! that live until explicitly deleted. `LocalRef` and `GlobalRef` delete on
//! drop, so each reference is released exactly once on every path.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use jni_sys::{JNI_OK, jint, jobject};
use tracing::warn;

use crate::interface::CallInterface;

/// A runtime instance plus its liveness.
///
/// Shared by the host and every outstanding `GlobalRef`; once destroyed, no
/// further calls reach the interface.
pub(crate) struct Jvm {
    interface: Box<dyn CallInterface>,
    destroyed: Cell<bool>,
}

impl Jvm {
    pub(crate) fn new(interface: Box<dyn CallInterface>) -> Rc<Self> {
        Rc::new(Self {
            interface,
            destroyed: Cell::new(false),
        })
    }

    pub(crate) fn env(&self) -> &dyn CallInterface {
        self.interface.as_ref()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Destroys the runtime once; later calls report success without
    /// touching it.
    pub(crate) fn destroy(&self) -> jint {
        if self.destroyed.replace(true) {
            return JNI_OK;
        }
        self.interface.destroy()
    }

    /// Wraps a freshly returned local reference; `None` if it is null.
    pub(crate) fn local(&self, raw: jobject) -> Option<LocalRef<'_>> {
        (!raw.is_null()).then_some(LocalRef { jvm: self, raw })
    }

    /// Describes and clears a pending exception. Returns whether one was
    /// pending.
    pub(crate) fn drain_exception(&self) -> bool {
        let env = self.env();
        if !env.exception_check() {
            return false;
        }
        env.exception_describe();
        env.exception_clear();
        warn!("Drained pending Java exception");
        true
    }
}

/// A local reference, deleted when dropped.
pub(crate) struct LocalRef<'a> {
    jvm: &'a Jvm,
    raw: jobject,
}

impl<'a> LocalRef<'a> {
    pub(crate) fn as_raw(&self) -> jobject {
        self.raw
    }

    /// Promotes to a global reference. `None` if the runtime refused.
    pub(crate) fn to_global(&self, jvm: &Rc<Jvm>) -> Option<GlobalRef> {
        let raw = jvm.env().new_global_ref(self.raw);
        (!raw.is_null()).then(|| GlobalRef {
            jvm: Rc::clone(jvm),
            raw,
        })
    }
}

impl Drop for LocalRef<'_> {
    fn drop(&mut self) {
        if !self.jvm.is_destroyed() {
            self.jvm.env().delete_local_ref(self.raw);
        }
    }
}

/// A global reference into the runtime, deleted when dropped.
///
/// Dropping a `GlobalRef` after its runtime was destroyed is a no-op: the
/// reference went away with the runtime.
pub struct GlobalRef {
    jvm: Rc<Jvm>,
    raw: jobject,
}

impl GlobalRef {
    /// The raw handle, valid until this guard is dropped or the runtime is
    /// destroyed.
    pub fn as_raw(&self) -> jobject {
        self.raw
    }
}

impl fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalRef")
            .field("raw", &self.raw)
            .field("destroyed", &self.jvm.is_destroyed())
            .finish()
    }
}

impl Drop for GlobalRef {
    fn drop(&mut self) {
        if !self.jvm.is_destroyed() {
            self.jvm.env().delete_global_ref(self.raw);
        }
    }
}
