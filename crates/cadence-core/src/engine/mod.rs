//! Cadence generation controller: vocabulary + stop rules around an external engine.

use std::fmt;
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use cadence_abi::token::Token;

use crate::config::ControllerConfig;
use crate::error::Result;
use crate::tokenizer;
use crate::vocab::Vocabulary;

// Child modules (private to this crate). They can access private fields here.
mod decode;
mod prefill;
mod utils;

pub use utils::argmax;

/// Why a generation request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The engine picked the end-of-sequence token (never delivered).
    EndOfSequence,
    /// `max_new_tokens` tokens were delivered.
    MaxTokens,
    /// The engine returned no scores for a step.
    ScoringFailure,
    /// An engine call failed; carries the engine's message.
    EngineError(String),
    /// The stop handle was flipped mid-request.
    Cancelled,
    /// Nothing to prefill.
    EmptyPrompt,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfSequence => f.write_str("end of sequence"),
            StopReason::MaxTokens => f.write_str("token limit reached"),
            StopReason::ScoringFailure => f.write_str("engine returned no scores"),
            StopReason::EngineError(e) => write!(f, "engine error: {e}"),
            StopReason::Cancelled => f.write_str("cancelled"),
            StopReason::EmptyPrompt => f.write_str("empty prompt"),
        }
    }
}

/// Summary of one finished `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub stop: StopReason,
    /// Number of `on_token` deliveries.
    pub emitted: usize,
    /// Number of `run_step` calls (prefill included).
    pub engine_calls: usize,
    /// Delivered fragments, concatenated in order.
    pub text: String,
}

/// Controller = {vocabulary} + {generation policy} + {stop flag}.
///
/// Holds no engine state; the engine and conversation handle are passed per call,
/// and `generate` takes the engine by `&mut` so one handle only ever sees one request.
pub struct GenerationController {
    vocab: Vocabulary,
    config: ControllerConfig,

    /// STOP flag (flipped by the host to cancel mid-generation).
    stop_flag: Arc<AtomicBool>,
}

impl GenerationController {
    pub fn new(vocab: Vocabulary, config: ControllerConfig) -> Self {
        Self {
            vocab,
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load the vocabulary resource and build a controller. Resource errors are fatal.
    pub fn from_resource<P: AsRef<Path>>(path: P, config: ControllerConfig) -> Result<Self> {
        let vocab = Vocabulary::load(path, &config)?;
        Ok(Self::new(vocab, config))
    }

    #[inline]
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    #[inline]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[inline]
    pub fn eos_token(&self) -> Option<Token> {
        self.vocab.specials().eos
    }

    /// Shared cancel flag; `store(true)` ends the running request after its current step.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    #[inline]
    fn clear_stop(&self) {
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    #[inline]
    fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    // ─────────────────────────────────────────────
    // Text ↔ ids (thin wrappers over `tokenizer`)
    // ─────────────────────────────────────────────

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        tokenizer::tokenize(&self.vocab, text)
    }

    pub fn detokenize(&self, id: Token) -> &str {
        tokenizer::detokenize(&self.vocab, id, self.config.unknown_display)
    }
}

// NOTE: The loop itself lives in child modules as `impl GenerationController`:
//
// - prefill.rs:    prefill(...) + step(...)
// - decode.rs:     generate(...) and the decode loop
// - utils.rs:      argmax(...), select_next(...)
