//! Mock engine plugin: C-ABI shim over an in-process `MockEngine`.

pub mod model;

pub use model::{MockEngine, TransitionModel};

use core::ffi::c_char;
use std::{
    cell::RefCell,
    ffi::{CStr, CString},
    path::Path,
    ptr, slice,
    sync::{Mutex, MutexGuard},
};

use cadence_abi::ffi::*;
use cadence_abi::{ConversationHandle, InferenceEngine, Token};

static ENGINE: Mutex<MockEngine> = Mutex::new(MockEngine::new());

fn engine() -> MutexGuard<'static, MockEngine> {
    ENGINE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// -----------------------------
// Error plumbing (thread-local)
// -----------------------------

thread_local! {
    static LAST_ERR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: impl AsRef<str>) {
    let s = CString::new(msg.as_ref().replace('\0', " ")).unwrap_or_default();
    LAST_ERR.with(|slot| *slot.borrow_mut() = Some(s));
}

fn clear_last_error() {
    LAST_ERR.with(|slot| *slot.borrow_mut() = None);
}

fn empty_string() -> CadenceString {
    CadenceString {
        ptr: ptr::null_mut(),
        len: 0,
    }
}

fn empty_floats() -> FloatArray {
    FloatArray {
        ptr: ptr::null_mut(),
        len: 0,
        positions: 0,
    }
}

unsafe extern "C" fn last_error() -> CadenceString {
    match LAST_ERR.with(|slot| slot.borrow_mut().take()) {
        Some(cs) => {
            let len = cs.as_bytes().len();
            CadenceString {
                ptr: cs.into_raw(),
                len,
            }
        }
        None => empty_string(),
    }
}

unsafe extern "C" fn free_string(s: CadenceString) {
    if !s.ptr.is_null() {
        drop(unsafe { CString::from_raw(s.ptr) });
    }
}

unsafe extern "C" fn free_floats(arr: FloatArray) {
    if !arr.ptr.is_null() {
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(arr.ptr, arr.len)) });
    }
}

// -----------------------------
// Engine API wrappers
// -----------------------------

unsafe extern "C" fn init() -> bool {
    clear_last_error();
    match engine().init() {
        Ok(()) => true,
        Err(e) => {
            set_last_error(e);
            false
        }
    }
}

unsafe extern "C" fn shutdown() {
    engine().shutdown();
}

unsafe extern "C" fn load_model(model_path: *const c_char) -> bool {
    clear_last_error();
    if model_path.is_null() {
        set_last_error("null model path");
        return false;
    }
    let path = match unsafe { CStr::from_ptr(model_path) }.to_str() {
        Ok(v) => v,
        Err(e) => {
            set_last_error(format!("invalid UTF-8 in path: {e}"));
            return false;
        }
    };
    match engine().load_model(Path::new(path)) {
        Ok(()) => true,
        Err(e) => {
            set_last_error(e);
            false
        }
    }
}

unsafe extern "C" fn unload_model() {
    engine().unload_model();
}

unsafe extern "C" fn start_conversation() -> u64 {
    clear_last_error();
    match engine().start_conversation() {
        Ok(h) => h.raw(),
        Err(e) => {
            set_last_error(e);
            NO_CONVERSATION
        }
    }
}

unsafe extern "C" fn end_conversation(handle: u64) {
    if let Some(h) = ConversationHandle::new(handle) {
        engine().end_conversation(h);
    }
}

unsafe extern "C" fn run_step(handle: u64, tokens: *const i32, len: usize) -> FloatArray {
    clear_last_error();
    let Some(handle) = ConversationHandle::new(handle) else {
        set_last_error("null conversation handle");
        return empty_floats();
    };
    if tokens.is_null() && len > 0 {
        set_last_error("null token buffer");
        return empty_floats();
    }
    let ids: Vec<Token> = if len == 0 {
        Vec::new()
    } else {
        unsafe { slice::from_raw_parts(tokens, len) }
            .iter()
            .copied()
            .map(Token)
            .collect()
    };

    match engine().run_step(handle, &ids) {
        Ok(scores) => {
            let positions = scores.positions();
            let values = scores.into_values().into_boxed_slice();
            let len = values.len();
            FloatArray {
                ptr: Box::into_raw(values) as *mut f32,
                len,
                positions,
            }
        }
        Err(e) => {
            set_last_error(e);
            empty_floats()
        }
    }
}

// -----------------------------
// Static EngineApi surface
// -----------------------------

static API: EngineApi = EngineApi {
    info: PluginInfo {
        abi_version: CADENCE_ABI_VERSION,
        id: c"mock-engine".as_ptr(),
        semver: c"0.1.0".as_ptr(),
    },
    init,
    shutdown,
    load_model,
    unload_model,
    start_conversation,
    end_conversation,
    run_step,
    free_floats,
    last_error,
    free_string,
};

#[unsafe(no_mangle)]
pub extern "C" fn cadence_engine_entry_v1() -> *const EngineApi {
    &API
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn take_error(api: &EngineApi) -> String {
        unsafe {
            let s = (api.last_error)();
            if s.ptr.is_null() {
                return String::new();
            }
            let out = CStr::from_ptr(s.ptr).to_string_lossy().into_owned();
            (api.free_string)(s);
            out
        }
    }

    // Single test: the plugin state is process-global.
    #[test]
    fn full_lifecycle_through_the_vtable() {
        let api = unsafe { &*cadence_engine_entry_v1() };
        assert_eq!(api.info.abi_version, CADENCE_ABI_VERSION);
        assert_eq!(
            unsafe { CStr::from_ptr(api.info.id) }.to_str().unwrap(),
            "mock-engine"
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, r#"{ "vocab_size": 5, "transitions": { "1": 4 }, "fallback": 3 }"#)
            .unwrap();
        let cpath = CString::new(path.to_str().unwrap()).unwrap();

        unsafe {
            assert!((api.init)());
            assert!(!(api.load_model)(c"/nope/missing.json".as_ptr()));
            assert!(take_error(api).contains("cannot read"));
            assert!((api.load_model)(cpath.as_ptr()));

            let conv = (api.start_conversation)();
            assert_ne!(conv, NO_CONVERSATION);

            let ids = [1i32];
            let arr = (api.run_step)(conv, ids.as_ptr(), ids.len());
            assert_eq!((arr.len, arr.positions), (5, 1));
            assert_eq!(slice::from_raw_parts(arr.ptr, arr.len)[4], 1.0);
            (api.free_floats)(arr);

            (api.end_conversation)(conv);
            let arr = (api.run_step)(conv, ids.as_ptr(), ids.len());
            assert!(arr.ptr.is_null());
            assert!(take_error(api).contains("not open"));

            (api.unload_model)();
            (api.shutdown)();
        }
    }
}
