use std::{ffi::CString, path::Path, slice};

use super::loader::{check_abi, load_plugin_once};
use cadence_abi::{ConversationHandle, InferenceEngine, Scores, Token, ffi::*};

/// `InferenceEngine` backed by a dynamically loaded engine plugin.
pub struct PluginEngine {
    api: &'static EngineApi,
}

// SAFETY: the vtable is immutable; the plugin serializes its own state and the
// host only drives it through `&mut self`.
unsafe impl Send for PluginEngine {}

fn make_cstring(s: &str) -> Result<CString, String> {
    CString::new(s).map_err(|_| "string contains interior NUL".to_string())
}

unsafe fn take_plugin_string(api_free: FreeStringFn, s: CadenceString) -> String {
    if s.ptr.is_null() || s.len == 0 {
        return String::new();
    }
    let out = {
        let bytes = unsafe { slice::from_raw_parts(s.ptr as *const u8, s.len) };
        String::from_utf8_lossy(bytes).into_owned()
    };
    unsafe { api_free(s) };
    out
}

impl PluginEngine {
    /// Locate, load and version-check the plugin (once per process).
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        let plugin = load_plugin_once(explicit)?;
        Self::from_api(plugin.api)
    }

    pub fn from_api(api: &'static EngineApi) -> Result<Self, String> {
        check_abi(api)?;
        Ok(Self { api })
    }

    fn last_error_or(&self, fallback: &str) -> String {
        let msg = unsafe {
            let s = (self.api.last_error)();
            take_plugin_string(self.api.free_string, s)
        };
        if msg.is_empty() { fallback.to_string() } else { msg }
    }
}

impl InferenceEngine for PluginEngine {
    fn init(&mut self) -> Result<(), String> {
        if unsafe { (self.api.init)() } {
            Ok(())
        } else {
            Err(self.last_error_or("engine init failed"))
        }
    }

    fn shutdown(&mut self) {
        unsafe { (self.api.shutdown)() };
    }

    fn load_model(&mut self, path: &Path) -> Result<(), String> {
        let cpath = make_cstring(path.to_str().ok_or("model path not valid UTF-8")?)?;
        if unsafe { (self.api.load_model)(cpath.as_ptr()) } {
            Ok(())
        } else {
            Err(self.last_error_or("load_model failed"))
        }
    }

    fn unload_model(&mut self) {
        unsafe { (self.api.unload_model)() };
    }

    fn start_conversation(&mut self) -> Result<ConversationHandle, String> {
        let raw = unsafe { (self.api.start_conversation)() };
        ConversationHandle::new(raw).ok_or_else(|| self.last_error_or("start_conversation failed"))
    }

    fn end_conversation(&mut self, handle: ConversationHandle) {
        unsafe { (self.api.end_conversation)(handle.raw()) };
    }

    fn run_step(&mut self, handle: ConversationHandle, tokens: &[Token]) -> Result<Scores, String> {
        let ids: Vec<i32> = tokens.iter().map(|t| t.0).collect();
        let arr = unsafe { (self.api.run_step)(handle.raw(), ids.as_ptr(), ids.len()) };

        if arr.ptr.is_null() || arr.len == 0 {
            if !arr.ptr.is_null() {
                unsafe { (self.api.free_floats)(arr) };
            }
            let msg = unsafe {
                let s = (self.api.last_error)();
                take_plugin_string(self.api.free_string, s)
            };
            // No buffer and no message: an empty score set, handled upstream.
            return if msg.is_empty() {
                Ok(Scores::default())
            } else {
                Err(msg)
            };
        }

        let values = unsafe { slice::from_raw_parts(arr.ptr, arr.len) }.to_vec();
        unsafe { (self.api.free_floats)(arr) };
        Ok(Scores::new(values, arr.positions.max(1)))
    }
}
