//! The slice of the JNI function tables the host drives.
//!
//! `CallInterface` mirrors the native table one-to-one: handles are raw,
//! failures come back as null, and pending exceptions stay pending until
//! someone drains them. Ownership of references is layered on top in
//! [`crate::refs`].

use std::ffi::{CStr, CString, c_void};
use std::mem::ManuallyDrop;
use std::ptr;

use jni_sys::{
    JNI_ERR, JNI_FALSE, JNI_OK, JNI_TRUE, JNIEnv, JavaVM, JavaVMInitArgs, JavaVMOption, jclass, jint,
    jmethodID, jobject, jobjectArray, jsize, jstring, jvalue,
};

use crate::config::RuntimeConfig;
use crate::error::{HostError, JniStatus, Result};
use crate::library::JvmLibrary;

/// Calls into one runtime instance through its environment handle.
///
/// Every handle passed in must have been produced by the same implementation.
pub(crate) trait CallInterface {
    fn version(&self) -> jint;
    fn find_class(&self, name: &CStr) -> jclass;
    fn get_method_id(&self, class: jclass, name: &CStr, sig: &CStr) -> jmethodID;
    fn get_static_method_id(&self, class: jclass, name: &CStr, sig: &CStr) -> jmethodID;
    fn new_string_utf(&self, utf: &CStr) -> jstring;
    fn new_object(&self, class: jclass, ctor: jmethodID, args: &[jvalue]) -> jobject;
    fn new_object_array(&self, len: jsize, class: jclass, init: jobject) -> jobjectArray;
    fn call_object_method(&self, obj: jobject, method: jmethodID, args: &[jvalue]) -> jobject;
    fn call_static_void_method(&self, class: jclass, method: jmethodID, args: &[jvalue]);
    fn new_global_ref(&self, obj: jobject) -> jobject;
    fn delete_global_ref(&self, obj: jobject);
    fn delete_local_ref(&self, obj: jobject);
    fn exception_check(&self) -> bool;
    fn exception_describe(&self);
    fn exception_clear(&self);
    /// Destroys the runtime. No other call is valid afterwards.
    fn destroy(&self) -> jint;
}

/// Option strings converted for the creation call.
pub(crate) struct VmOptions {
    version: jint,
    strings: Vec<CString>,
    ignore_unrecognized: bool,
}

impl VmOptions {
    pub(crate) fn new(config: &RuntimeConfig) -> Result<Self> {
        let strings = config
            .options
            .iter()
            .map(|o| CString::new(o.as_str()).map_err(|_| HostError::InvalidOption(o.clone())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version: config.jni_version,
            strings,
            ignore_unrecognized: config.ignore_unrecognized,
        })
    }
}

/// Invokes a function from the native environment table.
macro_rules! env_call {
    ($self:ident, $func:ident $(, $arg:expr)*) => {{
        let env = $self.env;
        // SAFETY: `env` is the live environment of the creating thread, and
        // the host only ever passes back handles this runtime produced.
        unsafe {
            let f = (**env).$func.expect(concat!(
                "conforming runtimes populate JNI table entry ",
                stringify!($func)
            ));
            f(env $(, $arg)*)
        }
    }};
}

/// The production interface: raw `JavaVM*` and `JNIEnv*` from
/// `JNI_CreateJavaVM`.
pub(crate) struct RawInterface {
    vm: *mut JavaVM,
    env: *mut JNIEnv,
    // Never unloaded: the runtime keeps threads and exit hooks pointing into
    // the library even after DestroyJavaVM.
    _library: ManuallyDrop<JvmLibrary>,
}

impl RawInterface {
    /// Calls the creation entry point on the current thread.
    ///
    /// The library stays resident whatever the outcome: a failed creation
    /// may already have started runtime threads or registered exit hooks.
    pub(crate) fn create(library: JvmLibrary, options: &VmOptions) -> Result<Self> {
        let library = ManuallyDrop::new(library);
        let mut raw_options: Vec<JavaVMOption> = options
            .strings
            .iter()
            .map(|s| JavaVMOption {
                optionString: s.as_ptr() as *mut _,
                extraInfo: ptr::null_mut(),
            })
            .collect();

        let mut args = JavaVMInitArgs {
            version: options.version,
            nOptions: raw_options.len() as jint,
            options: raw_options.as_mut_ptr(),
            ignoreUnrecognized: if options.ignore_unrecognized {
                JNI_TRUE
            } else {
                JNI_FALSE
            },
        };

        let mut vm: *mut JavaVM = ptr::null_mut();
        let mut env: *mut c_void = ptr::null_mut();

        tracing::debug!(
            "Creating JVM from {} with {} option(s)",
            library.path().display(),
            raw_options.len()
        );

        // SAFETY: Out-pointers are valid, `args` and the option strings it
        // points to outlive the call.
        let status = unsafe {
            (library.create_fn())(
                &mut vm,
                &mut env,
                &mut args as *mut JavaVMInitArgs as *mut c_void,
            )
        };

        if status != JNI_OK || vm.is_null() || env.is_null() {
            return Err(HostError::CreateFailed {
                status: JniStatus::from(status),
            });
        }

        Ok(Self {
            vm,
            env: env as *mut JNIEnv,
            _library: library,
        })
    }
}

impl CallInterface for RawInterface {
    fn version(&self) -> jint {
        env_call!(self, GetVersion)
    }

    fn find_class(&self, name: &CStr) -> jclass {
        env_call!(self, FindClass, name.as_ptr())
    }

    fn get_method_id(&self, class: jclass, name: &CStr, sig: &CStr) -> jmethodID {
        env_call!(self, GetMethodID, class, name.as_ptr(), sig.as_ptr())
    }

    fn get_static_method_id(&self, class: jclass, name: &CStr, sig: &CStr) -> jmethodID {
        env_call!(self, GetStaticMethodID, class, name.as_ptr(), sig.as_ptr())
    }

    fn new_string_utf(&self, utf: &CStr) -> jstring {
        env_call!(self, NewStringUTF, utf.as_ptr())
    }

    fn new_object(&self, class: jclass, ctor: jmethodID, args: &[jvalue]) -> jobject {
        env_call!(self, NewObjectA, class, ctor, args.as_ptr())
    }

    fn new_object_array(&self, len: jsize, class: jclass, init: jobject) -> jobjectArray {
        env_call!(self, NewObjectArray, len, class, init)
    }

    fn call_object_method(&self, obj: jobject, method: jmethodID, args: &[jvalue]) -> jobject {
        env_call!(self, CallObjectMethodA, obj, method, args.as_ptr())
    }

    fn call_static_void_method(&self, class: jclass, method: jmethodID, args: &[jvalue]) {
        env_call!(self, CallStaticVoidMethodA, class, method, args.as_ptr())
    }

    fn new_global_ref(&self, obj: jobject) -> jobject {
        env_call!(self, NewGlobalRef, obj)
    }

    fn delete_global_ref(&self, obj: jobject) {
        env_call!(self, DeleteGlobalRef, obj)
    }

    fn delete_local_ref(&self, obj: jobject) {
        env_call!(self, DeleteLocalRef, obj)
    }

    fn exception_check(&self) -> bool {
        env_call!(self, ExceptionCheck) != JNI_FALSE
    }

    fn exception_describe(&self) {
        env_call!(self, ExceptionDescribe)
    }

    fn exception_clear(&self) {
        env_call!(self, ExceptionClear)
    }

    fn destroy(&self) -> jint {
        let vm = self.vm;
        // SAFETY: `vm` came from a successful creation call and the host
        // destroys it at most once.
        match unsafe { (**vm).DestroyJavaVM } {
            Some(f) => unsafe { f(vm) },
            // Runs from Drop, so report rather than panic.
            None => JNI_ERR,
        }
    }
}
