//! Cadence ABI crate: stable contracts shared by the controller, the host app and engine plugins.

pub mod engine;
pub mod ffi;
pub mod token;

pub use engine::*;
pub use token::*;
