//! Cadence core: drives an external inference engine from text to streamed text.
//!
//! - `vocab`: token ↔ id store loaded from `vocab.json` / `tokenizer.json`.
//! - `tokenizer`: whitespace tokenizer + per-id detokenizer.
//! - `engine`: `GenerationController`, the prefill/decode loop and its stop rules.
//! - `session`: engine + conversation lifecycle for one chat session.

pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod tokenizer;
pub mod vocab;

pub use config::{ControllerConfig, UnknownDisplay};
pub use engine::{GenerationController, GenerationOutcome, StopReason, argmax};
pub use error::{CadenceError, ResourceError, Result};
pub use session::EngineSession;
pub use vocab::{SpecialTokens, Vocabulary};

pub use cadence_abi::{ConversationHandle, InferenceEngine, Scores, Token};
