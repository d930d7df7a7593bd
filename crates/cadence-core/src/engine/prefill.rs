use super::utils::select_next;
use super::{GenerationController, StopReason};
use cadence_abi::engine::{ConversationHandle, InferenceEngine};
use cadence_abi::token::Token;

/// Where a request is in `Idle → Prefilling → Decoding(n) → Stopped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Phase {
    Idle,
    Prefilling,
    Decoding(usize),
    Stopped(StopReason),
}

/// Per-request loop state. Dropped when the request ends.
#[derive(Debug)]
pub(super) struct DecodeState {
    pub(super) phase: Phase,
    pub(super) emitted: usize,
    pub(super) engine_calls: usize,
    pub(super) last_token: Option<Token>,
    pub(super) text: String,
}

impl DecodeState {
    pub(super) fn new() -> Self {
        Self {
            phase: Phase::Idle,
            emitted: 0,
            engine_calls: 0,
            last_token: None,
            text: String::new(),
        }
    }

    pub(super) fn enter(&mut self, next: Phase) {
        debug_assert!(
            !(next == Phase::Prefilling && self.phase != Phase::Idle),
            "prefill is only reachable from Idle"
        );
        debug_assert!(!matches!(self.phase, Phase::Stopped(_)), "already stopped");
        tracing::trace!("🔀 [generate] {:?} → {:?}", self.phase, next);
        self.phase = next;
    }

    pub(super) fn record(&mut self, token: Token, fragment: &str) {
        self.emitted += 1;
        self.last_token = Some(token);
        self.text.push_str(fragment);
    }
}

impl GenerationController {
    /// Prefill: one engine call with the whole prompt; yields the first candidate.
    pub(super) fn prefill<E>(
        &self,
        engine: &mut E,
        conversation: ConversationHandle,
        prompt_tokens: &[Token],
        state: &mut DecodeState,
    ) -> Result<Token, StopReason>
    where
        E: InferenceEngine + ?Sized,
    {
        state.enter(Phase::Prefilling);
        tracing::debug!(
            "⚙️ [prefill] {} tokens, conversation {}",
            prompt_tokens.len(),
            conversation.raw()
        );
        let first = self.step(engine, conversation, prompt_tokens, state)?;
        tracing::debug!("✅ [prefill] Done; first candidate {first}");
        Ok(first)
    }

    /// One engine call + greedy pick. Failures come back as the reason to stop.
    pub(super) fn step<E>(
        &self,
        engine: &mut E,
        conversation: ConversationHandle,
        window: &[Token],
        state: &mut DecodeState,
    ) -> Result<Token, StopReason>
    where
        E: InferenceEngine + ?Sized,
    {
        state.engine_calls += 1;
        let scores = engine.run_step(conversation, window).map_err(|e| {
            tracing::warn!("❌ [step] engine call {} failed: {e}", state.engine_calls);
            StopReason::EngineError(e)
        })?;

        select_next(&scores).ok_or_else(|| {
            tracing::warn!(
                "⚠️ [step] engine call {} returned no scores; stopping",
                state.engine_calls
            );
            StopReason::ScoringFailure
        })
    }
}
