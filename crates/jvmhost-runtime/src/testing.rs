//! Recording stand-in for a live runtime.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::rc::Rc;

use jni_sys::{JNI_OK, jclass, jint, jmethodID, jobject, jobjectArray, jsize, jstring, jvalue};

use crate::config::JNI_VERSION_10;
use crate::interface::CallInterface;

/// What a fake reference points at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FakeObject {
    Class(String),
    Str(String),
    Instance { class: String, args: Vec<usize> },
    Array { len: jsize, init: usize },
}

#[derive(Debug)]
pub(crate) struct FakeState {
    next_id: usize,
    objects: HashMap<usize, FakeObject>,
    methods: HashMap<usize, (String, String)>,
    locals: HashSet<usize>,
    globals: HashSet<usize>,
    failures: HashSet<String>,
    destroyed: bool,

    pub version: jint,
    pub destroy_status: jint,
    pub pending_exception: bool,
    pub described: usize,
    pub local_deletes: usize,
    pub global_deletes: usize,
    pub bad_deletes: usize,
    pub static_calls: Vec<String>,
    pub destroy_calls: usize,
    pub calls_after_destroy: usize,
    pub globals_at_destroy: Option<usize>,
}

impl FakeState {
    fn new() -> Self {
        Self {
            next_id: 1,
            objects: HashMap::new(),
            methods: HashMap::new(),
            locals: HashSet::new(),
            globals: HashSet::new(),
            failures: HashSet::new(),
            destroyed: false,
            version: JNI_VERSION_10,
            destroy_status: JNI_OK,
            pending_exception: false,
            described: 0,
            local_deletes: 0,
            global_deletes: 0,
            bad_deletes: 0,
            static_calls: Vec::new(),
            destroy_calls: 0,
            calls_after_destroy: 0,
            globals_at_destroy: None,
        }
    }

    pub fn live_locals(&self) -> usize {
        self.locals.len()
    }

    pub fn live_globals(&self) -> usize {
        self.globals.len()
    }

    pub fn is_live_global(&self, raw: jobject) -> bool {
        self.globals.contains(&(raw as usize))
    }

    pub fn object(&self, raw: jobject) -> Option<&FakeObject> {
        self.objects.get(&(raw as usize))
    }

    /// URL strings of every `java.net.URL` constructed so far.
    pub fn urls(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.objects.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| match &self.objects[&id] {
                FakeObject::Instance { class, args } if class == "java/net/URL" => {
                    match args.first().and_then(|a| self.objects.get(a)) {
                        Some(FakeObject::Str(s)) => Some(s.clone()),
                        _ => None,
                    }
                }
                _ => None,
            })
            .collect()
    }

    fn touch(&mut self) {
        if self.destroyed {
            self.calls_after_destroy += 1;
        }
    }

    /// Whether `key` is configured to fail; if so, raises a pending exception.
    fn fails(&mut self, key: &str) -> bool {
        if self.failures.contains(key) {
            self.pending_exception = true;
            true
        } else {
            false
        }
    }

    fn alloc_local(&mut self, object: FakeObject) -> jobject {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        self.locals.insert(id);
        id as jobject
    }

    fn alloc_method(&mut self, class: String, name: String) -> jmethodID {
        let id = self.next_id;
        self.next_id += 1;
        self.methods.insert(id, (class, name));
        id as jmethodID
    }

    fn class_name(&self, class: jclass) -> String {
        match self.objects.get(&(class as usize)) {
            Some(FakeObject::Class(name)) => name.clone(),
            other => panic!("not a class handle: {other:?}"),
        }
    }

    fn method(&self, method: jmethodID) -> (String, String) {
        self.methods
            .get(&(method as usize))
            .cloned()
            .unwrap_or_else(|| panic!("unknown method id {method:?}"))
    }
}

/// A `CallInterface` backed by in-memory bookkeeping.
///
/// Clones share state, so a test keeps one clone to inspect while the host
/// owns the other.
#[derive(Clone)]
pub(crate) struct FakeJvm {
    state: Rc<RefCell<FakeState>>,
}

impl FakeJvm {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeState::new())),
        }
    }

    /// Makes the call identified by `key` return null with an exception
    /// pending. Keys are class names (`java/net/URL`), methods
    /// (`java/net/URL.<init>`), `new <class>`, `NewStringUTF`,
    /// `NewObjectArray`, `NewGlobalRef`, or a class name passed to
    /// `loadClass`.
    pub fn fail_on(&self, key: &str) {
        self.state.borrow_mut().failures.insert(key.to_string());
    }

    pub fn state(&self) -> Ref<'_, FakeState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, FakeState> {
        self.state.borrow_mut()
    }

    fn lookup_method(&self, class: jclass, name: &CStr) -> jmethodID {
        let mut s = self.state.borrow_mut();
        s.touch();
        let class = s.class_name(class);
        let name = name.to_string_lossy().into_owned();
        if s.fails(&format!("{class}.{name}")) {
            return std::ptr::null_mut();
        }
        s.alloc_method(class, name)
    }
}

impl CallInterface for FakeJvm {
    fn version(&self) -> jint {
        let mut s = self.state.borrow_mut();
        s.touch();
        s.version
    }

    fn find_class(&self, name: &CStr) -> jclass {
        let mut s = self.state.borrow_mut();
        s.touch();
        let name = name.to_string_lossy().into_owned();
        if s.fails(&name) {
            return std::ptr::null_mut();
        }
        s.alloc_local(FakeObject::Class(name))
    }

    fn get_method_id(&self, class: jclass, name: &CStr, _sig: &CStr) -> jmethodID {
        self.lookup_method(class, name)
    }

    fn get_static_method_id(&self, class: jclass, name: &CStr, _sig: &CStr) -> jmethodID {
        self.lookup_method(class, name)
    }

    fn new_string_utf(&self, utf: &CStr) -> jstring {
        let mut s = self.state.borrow_mut();
        s.touch();
        if s.fails("NewStringUTF") {
            return std::ptr::null_mut();
        }
        s.alloc_local(FakeObject::Str(utf.to_string_lossy().into_owned()))
    }

    fn new_object(&self, class: jclass, _ctor: jmethodID, args: &[jvalue]) -> jobject {
        let mut s = self.state.borrow_mut();
        s.touch();
        let class = s.class_name(class);
        if s.fails(&format!("new {class}")) {
            return std::ptr::null_mut();
        }
        // SAFETY: The host only passes object arguments.
        let args = args.iter().map(|a| unsafe { a.l } as usize).collect();
        s.alloc_local(FakeObject::Instance { class, args })
    }

    fn new_object_array(&self, len: jsize, _class: jclass, init: jobject) -> jobjectArray {
        let mut s = self.state.borrow_mut();
        s.touch();
        if s.fails("NewObjectArray") {
            return std::ptr::null_mut();
        }
        s.alloc_local(FakeObject::Array {
            len,
            init: init as usize,
        })
    }

    fn call_object_method(&self, _obj: jobject, method: jmethodID, args: &[jvalue]) -> jobject {
        let mut s = self.state.borrow_mut();
        s.touch();
        let (class, name) = s.method(method);
        assert_eq!(name, "loadClass", "fake only models ClassLoader.loadClass");
        // SAFETY: loadClass takes a single String.
        let arg = unsafe { args[0].l } as usize;
        let requested = match s.objects.get(&arg) {
            Some(FakeObject::Str(name)) => name.clone(),
            other => panic!("loadClass argument is not a string: {other:?}"),
        };
        if s.fails(&format!("{class}.{name}")) || s.fails(&requested) {
            return std::ptr::null_mut();
        }
        s.alloc_local(FakeObject::Class(requested))
    }

    fn call_static_void_method(&self, class: jclass, method: jmethodID, _args: &[jvalue]) {
        let mut s = self.state.borrow_mut();
        s.touch();
        let class = s.class_name(class);
        let (_, name) = s.method(method);
        let call = format!("{class}.{name}");
        s.fails(&format!("call {call}"));
        s.static_calls.push(call);
    }

    fn new_global_ref(&self, obj: jobject) -> jobject {
        let mut s = self.state.borrow_mut();
        s.touch();
        if s.fails("NewGlobalRef") {
            return std::ptr::null_mut();
        }
        let object = s.objects[&(obj as usize)].clone();
        let raw = s.alloc_local(object);
        let id = raw as usize;
        s.locals.remove(&id);
        s.globals.insert(id);
        raw
    }

    fn delete_global_ref(&self, obj: jobject) {
        let mut s = self.state.borrow_mut();
        s.touch();
        s.global_deletes += 1;
        if !s.globals.remove(&(obj as usize)) {
            s.bad_deletes += 1;
        }
    }

    fn delete_local_ref(&self, obj: jobject) {
        let mut s = self.state.borrow_mut();
        s.touch();
        s.local_deletes += 1;
        if !s.locals.remove(&(obj as usize)) {
            s.bad_deletes += 1;
        }
    }

    fn exception_check(&self) -> bool {
        let mut s = self.state.borrow_mut();
        s.touch();
        s.pending_exception
    }

    fn exception_describe(&self) {
        let mut s = self.state.borrow_mut();
        s.touch();
        if s.pending_exception {
            s.described += 1;
        }
    }

    fn exception_clear(&self) {
        let mut s = self.state.borrow_mut();
        s.touch();
        s.pending_exception = false;
    }

    fn destroy(&self) -> jint {
        let mut s = self.state.borrow_mut();
        s.touch();
        s.destroy_calls += 1;
        s.globals_at_destroy = Some(s.globals.len());
        s.destroyed = true;
        s.destroy_status
    }
}
