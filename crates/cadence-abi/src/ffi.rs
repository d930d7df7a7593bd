use core::ffi::c_char;

/// Plugins reporting any other version are refused at load time.
pub const CADENCE_ABI_VERSION: u32 = 1;

pub const ENGINE_ENTRY_SYMBOL: &str = "cadence_engine_entry_v1";

/// Raw conversation handle value meaning "no conversation".
pub const NO_CONVERSATION: u64 = 0;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CadenceString {
    pub ptr: *mut c_char,
    pub len: usize,
}

/// Engine-allocated score buffer; hand it back through `free_floats`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FloatArray {
    pub ptr: *mut f32,
    pub len: usize,
    /// Number of positions the buffer holds (rows of `len / positions` scores).
    pub positions: usize,
}

#[repr(C)]
pub struct PluginInfo {
    pub abi_version: u32,
    pub id: *const c_char,     // "mock-engine"
    pub semver: *const c_char, // "0.1.0"
}

// ---------- Entry points ----------

pub type InitFn = unsafe extern "C" fn() -> bool;
pub type ShutdownFn = unsafe extern "C" fn();

pub type LoadModelFn = unsafe extern "C" fn(model_path: *const c_char) -> bool;
pub type UnloadModelFn = unsafe extern "C" fn();

/// Returns a conversation handle, or `NO_CONVERSATION` on failure.
pub type StartConversationFn = unsafe extern "C" fn() -> u64;
pub type EndConversationFn = unsafe extern "C" fn(handle: u64);

/// Returns an empty array (`ptr` null) on failure; details via `last_error`.
pub type RunStepFn =
    unsafe extern "C" fn(handle: u64, tokens: *const i32, len: usize) -> FloatArray;
pub type FreeFloatsFn = unsafe extern "C" fn(arr: FloatArray);

pub type LastErrorFn = unsafe extern "C" fn() -> CadenceString;
pub type FreeStringFn = unsafe extern "C" fn(s: CadenceString);

// ---------- VTable ----------

#[repr(C)]
pub struct EngineApi {
    pub info: PluginInfo,

    pub init: InitFn,
    pub shutdown: ShutdownFn,

    pub load_model: LoadModelFn,
    pub unload_model: UnloadModelFn,

    pub start_conversation: StartConversationFn,
    pub end_conversation: EndConversationFn,

    pub run_step: RunStepFn,
    pub free_floats: FreeFloatsFn,

    // Diagnostics & memory management
    pub last_error: LastErrorFn,
    pub free_string: FreeStringFn,
}

// SAFETY: the table is immutable after the plugin hands it out; the info
// pointers reference static C strings owned by the plugin image.
unsafe impl Sync for EngineApi {}

/// Plugin must export `cadence_engine_entry_v1` returning a pointer to a static `EngineApi`.
pub type EngineEntryFn = unsafe extern "C" fn() -> *const EngineApi;
