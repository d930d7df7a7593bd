use super::prefill::{DecodeState, Phase};
use super::{GenerationController, GenerationOutcome, StopReason};
use crate::error::{CadenceError, Result};
use cadence_abi::engine::{ConversationHandle, InferenceEngine};
use cadence_abi::token::Token;
use std::panic;

impl GenerationController {
    /// Prefill `initial_tokens`, then decode one token at a time, delivering each
    /// non-terminal token to `on_token` until EOS, `max_new_tokens`, a failed step,
    /// or cancellation.
    ///
    /// - The end-of-sequence token is never delivered.
    /// - At most `max_new_tokens` deliveries; no engine call after the last one.
    /// - `max_new_tokens == 0` issues the prefill call only if
    ///   `ControllerConfig::prefill_on_zero_budget` is set.
    /// - Engine and scoring failures end the request (see `StopReason`); only a
    ///   panic inside the loop is returned as `Err`.
    pub fn generate<E, F>(
        &self,
        engine: &mut E,
        conversation: ConversationHandle,
        initial_tokens: &[Token],
        max_new_tokens: usize,
        mut on_token: F,
    ) -> Result<GenerationOutcome>
    where
        E: InferenceEngine + ?Sized,
        F: FnMut(&str),
    {
        self.clear_stop();

        panic::catch_unwind(panic::AssertUnwindSafe(|| {
            tracing::info!(
                "🧠 [generate] Starting: {} prompt tokens, max_new_tokens={max_new_tokens}",
                initial_tokens.len()
            );

            let mut state = DecodeState::new();
            let stop = self.drive(
                engine,
                conversation,
                initial_tokens,
                max_new_tokens,
                &mut on_token,
                &mut state,
            );
            state.enter(Phase::Stopped(stop.clone()));

            tracing::info!(
                "✅ [generate] Complete ({stop}): {} tokens, {} engine calls, last {:?}",
                state.emitted,
                state.engine_calls,
                state.last_token
            );
            GenerationOutcome {
                stop,
                emitted: state.emitted,
                engine_calls: state.engine_calls,
                text: state.text,
            }
        }))
        .map_err(|_| {
            tracing::error!("💥 [generate] PANIC occurred during generation!");
            CadenceError::Panicked("generation")
        })
    }

    fn drive<E, F>(
        &self,
        engine: &mut E,
        conversation: ConversationHandle,
        initial_tokens: &[Token],
        max_new_tokens: usize,
        on_token: &mut F,
        state: &mut DecodeState,
    ) -> StopReason
    where
        E: InferenceEngine + ?Sized,
        F: FnMut(&str),
    {
        if initial_tokens.is_empty() {
            return StopReason::EmptyPrompt;
        }
        if max_new_tokens == 0 && !self.config.prefill_on_zero_budget {
            return StopReason::MaxTokens;
        }
        // The flag was cleared on entry; only another thread can have set it since.
        if self.stop_requested() {
            tracing::info!("⏹️ [generate] STOP requested before prefill.");
            return StopReason::Cancelled;
        }

        let mut candidate = match self.prefill(engine, conversation, initial_tokens, state) {
            Ok(t) => t,
            Err(reason) => return reason,
        };
        if max_new_tokens == 0 {
            return StopReason::MaxTokens;
        }

        let eos = self.eos_token();
        loop {
            if Some(candidate) == eos {
                tracing::debug!("🏁 [decode] Reached EOS token. Ending.");
                return StopReason::EndOfSequence;
            }

            let fragment = self.detokenize(candidate);
            tracing::debug!("🎯 [decode] step {}: {candidate} {fragment:?}", state.emitted);
            on_token(fragment);
            state.record(candidate, fragment);

            if state.emitted >= max_new_tokens {
                return StopReason::MaxTokens;
            }
            if self.stop_requested() {
                tracing::info!("⏹️ [decode] STOP requested. Ending.");
                return StopReason::Cancelled;
            }

            // Feed back only the new token; the engine holds the prior context.
            state.enter(Phase::Decoding(state.emitted));
            candidate = match self.step(engine, conversation, &[candidate], state) {
                Ok(t) => t,
                Err(reason) => return reason,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::vocab::Vocabulary;
    use cadence_abi::engine::Scores;
    use std::path::Path;

    /// Engine that always scores the same id highest and counts calls.
    struct Constant {
        winner: usize,
        width: usize,
        calls: usize,
    }

    impl InferenceEngine for Constant {
        fn init(&mut self) -> std::result::Result<(), String> {
            Ok(())
        }
        fn shutdown(&mut self) {}
        fn load_model(&mut self, _: &Path) -> std::result::Result<(), String> {
            Ok(())
        }
        fn unload_model(&mut self) {}
        fn start_conversation(&mut self) -> std::result::Result<ConversationHandle, String> {
            Ok(ConversationHandle::new(1).unwrap())
        }
        fn end_conversation(&mut self, _: ConversationHandle) {}
        fn run_step(
            &mut self,
            _: ConversationHandle,
            _: &[Token],
        ) -> std::result::Result<Scores, String> {
            self.calls += 1;
            let mut v = vec![0.0; self.width];
            v[self.winner] = 1.0;
            Ok(Scores::single(v))
        }
    }

    fn controller(cfg: ControllerConfig) -> GenerationController {
        let vocab =
            Vocabulary::from_json_str(r#"{ "<bos>": 1, "<eos>": 3, "hi": 4 }"#, &cfg).unwrap();
        GenerationController::new(vocab, cfg)
    }

    fn handle() -> ConversationHandle {
        ConversationHandle::new(7).unwrap()
    }

    #[test]
    fn zero_budget_prefills_by_default() {
        let c = controller(ControllerConfig::default());
        let mut engine = Constant { winner: 4, width: 5, calls: 0 };
        let mut seen = 0;
        let out = c
            .generate(&mut engine, handle(), &[Token(1)], 0, |_| seen += 1)
            .unwrap();
        assert_eq!(out.stop, StopReason::MaxTokens);
        assert_eq!((seen, engine.calls, out.engine_calls), (0, 1, 1));
    }

    #[test]
    fn zero_budget_without_prefill_makes_no_calls() {
        let c = controller(ControllerConfig {
            prefill_on_zero_budget: false,
            ..ControllerConfig::default()
        });
        let mut engine = Constant { winner: 4, width: 5, calls: 0 };
        let out = c
            .generate(&mut engine, handle(), &[Token(1)], 0, |_| {})
            .unwrap();
        assert_eq!(out.stop, StopReason::MaxTokens);
        assert_eq!(engine.calls, 0);
    }

    #[test]
    fn empty_prompt_never_reaches_the_engine() {
        let c = controller(ControllerConfig::default());
        let mut engine = Constant { winner: 4, width: 5, calls: 0 };
        let out = c.generate(&mut engine, handle(), &[], 5, |_| {}).unwrap();
        assert_eq!(out.stop, StopReason::EmptyPrompt);
        assert_eq!(engine.calls, 0);
    }

    #[test]
    fn budget_stops_without_a_trailing_call() {
        let c = controller(ControllerConfig::default());
        let mut engine = Constant { winner: 4, width: 5, calls: 0 };
        let out = c
            .generate(&mut engine, handle(), &[Token(1)], 3, |_| {})
            .unwrap();
        assert_eq!(out.emitted, 3);
        assert_eq!(engine.calls, 3);
        assert_eq!(out.text, "hihihi");
    }

    #[test]
    fn panicking_callback_is_reported() {
        let c = controller(ControllerConfig::default());
        let mut engine = Constant { winner: 4, width: 5, calls: 0 };
        let err = c
            .generate(&mut engine, handle(), &[Token(1)], 3, |_| panic!("ui went away"))
            .unwrap_err();
        assert!(matches!(err, CadenceError::Panicked("generation")));
    }
}
