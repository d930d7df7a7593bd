mod engine;
mod loader;
mod locate;

pub use engine::PluginEngine;
