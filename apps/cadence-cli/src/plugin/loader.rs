use std::ffi::CStr;
use std::path::Path;
use std::sync::OnceLock;

use cadence_abi::ffi::{CADENCE_ABI_VERSION, ENGINE_ENTRY_SYMBOL, EngineApi, EngineEntryFn};
use libloading::{Library, Symbol};

use super::locate::locate_plugin_binary;

/// Keeps the library mapped for as long as `api` is reachable.
pub(crate) struct LoadedPlugin {
    _lib: Library,
    pub(crate) api: &'static EngineApi,
}

unsafe impl Send for LoadedPlugin {}
unsafe impl Sync for LoadedPlugin {}

static PLUGIN: OnceLock<Result<LoadedPlugin, String>> = OnceLock::new();

/// Load the engine plugin once per process; later calls reuse the first result,
/// including a failure.
pub(crate) fn load_plugin_once(explicit: Option<&Path>) -> Result<&'static LoadedPlugin, String> {
    PLUGIN
        .get_or_init(|| {
            let path = locate_plugin_binary(explicit).ok_or_else(|| {
                "engine plugin not found; pass --plugin or set CADENCE_PLUGIN_PATH".to_string()
            })?;
            let lib = unsafe { Library::new(&path) }
                .map_err(|e| format!("failed to load plugin {}: {e}", path.display()))?;
            let api = resolve_api(&lib)?;
            tracing::info!(
                "🔌 [plugin] {} {} from {}",
                c_str_lossy(api.info.id),
                c_str_lossy(api.info.semver),
                path.display()
            );
            Ok(LoadedPlugin { _lib: lib, api })
        })
        .as_ref()
        .map_err(Clone::clone)
}

fn resolve_api(lib: &Library) -> Result<&'static EngineApi, String> {
    let entry: Symbol<EngineEntryFn> = unsafe { lib.get(ENGINE_ENTRY_SYMBOL.as_bytes()) }
        .map_err(|e| format!("missing symbol {ENGINE_ENTRY_SYMBOL}: {e}"))?;

    // SAFETY: the entry hands out a pointer to a static table inside the image,
    // which outlives this borrow because `LoadedPlugin` owns the `Library`.
    let api = unsafe { entry().as_ref() }.ok_or("plugin entry returned null")?;
    check_abi(api)?;
    Ok(api)
}

pub(crate) fn check_abi(api: &EngineApi) -> Result<(), String> {
    match api.info.abi_version {
        CADENCE_ABI_VERSION => Ok(()),
        other => Err(format!(
            "ABI mismatch: host={CADENCE_ABI_VERSION} plugin={other}"
        )),
    }
}

fn c_str_lossy(ptr: *const core::ffi::c_char) -> String {
    if ptr.is_null() {
        return "?".into();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
