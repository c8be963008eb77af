//! RuntimeHost: one embedded JVM and the bundle loaded into it.
//!
//! The host is the only owner of the runtime. Construction creates it,
//! dropping (or [`RuntimeHost::destroy`]) tears it down, and in between a
//! single bundle at a time can be loaded behind its own `URLClassLoader`.

use std::ffi::CString;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use jni_sys::{JNI_OK, jint, jvalue};
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{HostError, JniStatus, Result, Step};
use crate::interface::{CallInterface, RawInterface, VmOptions};
use crate::library::{JvmLibrary, LibraryLocator};
use crate::refs::{GlobalRef, Jvm};

/// The JVM cannot be created twice in one process, even after it has been
/// destroyed. The slot is claimed right before the creation call and never
/// released.
static RUNTIME_SLOT: InstanceSlot = InstanceSlot::new();

pub(crate) struct InstanceSlot {
    taken: AtomicBool,
}

impl InstanceSlot {
    pub(crate) const fn new() -> Self {
        Self {
            taken: AtomicBool::new(false),
        }
    }

    pub(crate) fn claim(&self) -> Result<()> {
        self.taken
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| HostError::AlreadyCreated)
    }

    pub(crate) fn is_taken(&self) -> bool {
        self.taken.load(Ordering::SeqCst)
    }
}

/// Interface version reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeVersion {
    pub major: u16,
    pub minor: u16,
}

impl From<jint> for RuntimeVersion {
    fn from(raw: jint) -> Self {
        Self {
            major: ((raw >> 16) & 0xffff) as u16,
            minor: (raw & 0xffff) as u16,
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Host for one embedded JVM.
///
/// Not `Send`: the environment handle is bound to the thread that created the
/// runtime.
pub struct RuntimeHost {
    jvm: Rc<Jvm>,
    version: RuntimeVersion,
    /// Class loader of the currently loaded bundle
    loader: Option<GlobalRef>,
}

impl RuntimeHost {
    /// Open the JVM library named by `config` and create the runtime on the
    /// current thread.
    ///
    /// Library and symbol failures can be retried with another path. Once
    /// the creation call has been made, whether it succeeded or not, no
    /// further runtime can be created in this process.
    pub fn initialize(config: &RuntimeConfig) -> Result<Self> {
        let path = LibraryLocator::from_config(config).resolve()?;
        info!("Loading JVM library from {}", path.display());

        let library = JvmLibrary::open(&path)?;
        Self::create_in(&RUNTIME_SLOT, library, config)
    }

    /// Create the runtime from an opened library, claiming `slot` first.
    fn create_in(
        slot: &InstanceSlot,
        library: JvmLibrary,
        config: &RuntimeConfig,
    ) -> Result<Self> {
        let options = VmOptions::new(config)?;

        slot.claim()?;
        let interface = RawInterface::create(library, &options).inspect_err(|e| {
            error!("{}", e);
        })?;

        Ok(Self::from_interface(Box::new(interface)))
    }

    pub(crate) fn from_interface(interface: Box<dyn CallInterface>) -> Self {
        let jvm = Jvm::new(interface);
        let version = RuntimeVersion::from(jvm.env().version());
        info!("JVM load succeeded: version {}", version);

        Self {
            jvm,
            version,
            loader: None,
        }
    }

    pub fn version(&self) -> RuntimeVersion {
        self.version
    }

    pub fn has_bundle(&self) -> bool {
        self.loader.is_some()
    }

    /// The class loader of the loaded bundle, if any.
    pub fn loader(&self) -> Option<&GlobalRef> {
        self.loader.as_ref()
    }

    /// Load the jar at `path` behind a fresh `URLClassLoader`.
    ///
    /// A loader already held is released once the new one is in place. If
    /// any step fails, the pending exception is drained and the previously
    /// held loader (if any) is kept.
    pub fn load_bundle(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let url = path
            .to_str()
            .and_then(|p| CString::new(format!("file:{p}")).ok())
            .ok_or_else(|| HostError::InvalidPath(path.to_path_buf()))?;

        let jvm = Rc::clone(&self.jvm);
        let env = jvm.env();

        let loader_class = jvm
            .local(env.find_class(c"java/net/URLClassLoader"))
            .ok_or_else(|| self.fail(Step::LoaderClass))?;
        let loader_ctor = env.get_method_id(
            loader_class.as_raw(),
            c"<init>",
            c"([Ljava/net/URL;)V",
        );
        if loader_ctor.is_null() {
            return Err(self.fail(Step::LoaderConstructor));
        }

        let url_class = jvm
            .local(env.find_class(c"java/net/URL"))
            .ok_or_else(|| self.fail(Step::UrlClass))?;
        let url_ctor = env.get_method_id(url_class.as_raw(), c"<init>", c"(Ljava/lang/String;)V");
        if url_ctor.is_null() {
            return Err(self.fail(Step::UrlConstructor));
        }

        let url_string = jvm
            .local(env.new_string_utf(&url))
            .ok_or_else(|| self.fail(Step::UrlString))?;
        let url_object = jvm
            .local(env.new_object(
                url_class.as_raw(),
                url_ctor,
                &[jvalue {
                    l: url_string.as_raw(),
                }],
            ))
            .ok_or_else(|| self.fail(Step::UrlObject))?;

        let url_array = jvm
            .local(env.new_object_array(1, url_class.as_raw(), url_object.as_raw()))
            .ok_or_else(|| self.fail(Step::UrlArray))?;

        let loader = jvm
            .local(env.new_object(
                loader_class.as_raw(),
                loader_ctor,
                &[jvalue {
                    l: url_array.as_raw(),
                }],
            ))
            .ok_or_else(|| self.fail(Step::LoaderInstance))?;

        let loader = loader
            .to_global(&jvm)
            .ok_or_else(|| self.fail(Step::LoaderGlobalRef))?;

        if self.loader.replace(loader).is_some() {
            debug!("Released previous bundle class loader");
        }
        info!("Loaded bundle {}", path.display());
        Ok(())
    }

    /// Resolve a class by binary name (`com.example.Main`) through the
    /// bundle's class loader.
    pub fn load_class(&self, name: &str) -> Result<GlobalRef> {
        let loader = self.loader.as_ref().ok_or(HostError::NoBundleLoaded)?;
        let c_name =
            CString::new(name).map_err(|_| HostError::InvalidClassName(name.to_string()))?;

        let jvm = &self.jvm;
        let env = jvm.env();

        let class_loader = jvm
            .local(env.find_class(c"java/lang/ClassLoader"))
            .ok_or_else(|| self.fail(Step::ClassLoaderClass))?;
        let load_class = env.get_method_id(
            class_loader.as_raw(),
            c"loadClass",
            c"(Ljava/lang/String;)Ljava/lang/Class;",
        );
        if load_class.is_null() {
            return Err(self.fail(Step::LoadClassMethod));
        }

        let j_name = jvm
            .local(env.new_string_utf(&c_name))
            .ok_or_else(|| self.fail(Step::ClassName))?;
        let class = env.call_object_method(
            loader.as_raw(),
            load_class,
            &[jvalue { l: j_name.as_raw() }],
        );
        let class = match jvm.local(class) {
            Some(class) if !env.exception_check() => class,
            _ => return Err(self.fail(Step::LoadedClass)),
        };

        let class = class
            .to_global(jvm)
            .ok_or_else(|| self.fail(Step::ClassGlobalRef))?;
        debug!("Loaded class {} from bundle", name);
        Ok(class)
    }

    /// Release the bundle's class loader, if one is held, and request a
    /// garbage collection.
    ///
    /// Returns whether a loader was released.
    pub fn unload_bundle(&mut self) -> Result<bool> {
        let released = self.loader.take().is_some();
        if released {
            info!("Released bundle class loader");
        }

        let jvm = &self.jvm;
        let env = jvm.env();

        let system = jvm
            .local(env.find_class(c"java/lang/System"))
            .ok_or_else(|| self.fail(Step::SystemClass))?;
        let gc = env.get_static_method_id(system.as_raw(), c"gc", c"()V");
        if gc.is_null() {
            return Err(self.fail(Step::GcMethod));
        }

        env.call_static_void_method(system.as_raw(), gc, &[]);
        if jvm.drain_exception() {
            warn!("System.gc() raised an exception");
        } else {
            debug!("Requested garbage collection");
        }

        Ok(released)
    }

    /// Release any held loader and destroy the runtime.
    pub fn destroy(mut self) -> Result<()> {
        match JniStatus::from(self.shutdown()) {
            JniStatus::Ok => Ok(()),
            status => Err(HostError::DestroyFailed { status }),
        }
    }

    fn shutdown(&mut self) -> jint {
        if self.jvm.is_destroyed() {
            return JNI_OK;
        }
        if self.loader.take().is_some() {
            debug!("Released bundle class loader before teardown");
        }
        let status = self.jvm.destroy();
        if status == JNI_OK {
            info!("JVM destroyed");
        }
        status
    }

    /// Drain any pending exception and build the error for a failed step.
    fn fail(&self, step: Step) -> HostError {
        let exception = self.jvm.drain_exception();
        error!("Could not {}", step);
        HostError::lookup(step, exception)
    }
}

impl Drop for RuntimeHost {
    fn drop(&mut self) {
        let status = self.shutdown();
        if status != JNI_OK {
            error!("Failed to destroy the JVM: {}", JniStatus::from(status));
        }
    }
}

impl fmt::Debug for RuntimeHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHost")
            .field("version", &self.version)
            .field("loader", &self.loader)
            .finish()
    }
}
