use crate::paths::plugins_dir;
use std::{
    env,
    path::{Path, PathBuf},
};

pub(crate) const ENV_PLUGIN_PATH: &str = "CADENCE_PLUGIN_PATH";

/// OS-specific file name of the engine plugin.
#[cfg(target_os = "windows")]
const PLUGIN_BASENAME: &str = "cadence_engine.dll";
#[cfg(target_os = "macos")]
const PLUGIN_BASENAME: &str = "libcadence_engine.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const PLUGIN_BASENAME: &str = "libcadence_engine.so";

/// Precedence:
///  1) explicit `--plugin` path
///  2) `CADENCE_PLUGIN_PATH`
///  3) `<plugins_dir>/<platform basename>`
pub(crate) fn locate_plugin_binary(explicit: Option<&Path>) -> Option<PathBuf> {
    locate_with(explicit, env::var(ENV_PLUGIN_PATH).ok(), plugins_dir())
}

fn locate_with(explicit: Option<&Path>, env_path: Option<String>, dir: PathBuf) -> Option<PathBuf> {
    if let Some(p) = explicit {
        if p.exists() {
            return Some(p.to_path_buf());
        }
        tracing::warn!("[plugin] --plugin points to missing file: {}", p.display());
    }

    if let Some(p) = env_path.map(PathBuf::from) {
        if p.exists() {
            tracing::info!("[plugin] {ENV_PLUGIN_PATH} = {}", p.display());
            return Some(p);
        }
        tracing::warn!(
            "[plugin] {ENV_PLUGIN_PATH} points to missing file: {}",
            p.display()
        );
    }

    let p = dir.join(PLUGIN_BASENAME);
    p.exists().then_some(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn explicit_beats_env_beats_default() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.so");
        let from_env = dir.path().join("env.so");
        let default = dir.path().join(PLUGIN_BASENAME);
        for p in [&explicit, &from_env, &default] {
            fs::write(p, b"").unwrap();
        }
        let env = Some(from_env.display().to_string());
        let base = dir.path().to_path_buf();

        assert_eq!(
            locate_with(Some(&explicit), env.clone(), base.clone()),
            Some(explicit.clone())
        );
        assert_eq!(locate_with(None, env.clone(), base.clone()), Some(from_env));
        assert_eq!(locate_with(None, None, base.clone()), Some(default.clone()));

        // Missing explicit path falls through instead of failing.
        let gone = dir.path().join("gone.so");
        assert_eq!(locate_with(Some(&gone), None, base), Some(default));
    }

    #[test]
    fn nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(locate_with(None, None, dir.path().to_path_buf()), None);
    }
}
