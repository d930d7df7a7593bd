use dirs::data_dir;
use std::path::PathBuf;

/// ~/.local/share/Cadence   (or platform-equivalent)
pub fn cadence_home() -> PathBuf {
    data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("Cadence")
}

/// ~/.local/share/Cadence/plugins
pub fn plugins_dir() -> PathBuf {
    cadence_home().join("plugins")
}

/// ~/.local/share/Cadence/assets/vocab.json
pub fn default_vocab_path() -> PathBuf {
    cadence_home().join("assets").join("vocab.json")
}

/// ~/.local/share/Cadence/models/model.bin
pub fn default_model_path() -> PathBuf {
    cadence_home().join("models").join("model.bin")
}

/// ~/.local/share/Cadence/config.json
pub fn default_config_path() -> PathBuf {
    cadence_home().join("config.json")
}

/// ~/.local/share/Cadence/logs
pub fn logs_dir() -> PathBuf {
    cadence_home().join("logs")
}
