//! One chat session = {initialized engine} + {loaded model} + {one conversation}.
//!
//! `open` runs init → load_model → start_conversation; any failure is an
//! engine-init error and whatever was acquired is released again.
//! Dropping (or `close`) ends the conversation and shuts the engine down once.

use std::path::Path;

use cadence_abi::engine::{ConversationHandle, InferenceEngine};

use crate::engine::{GenerationController, GenerationOutcome};
use crate::error::{CadenceError, Result};

pub struct EngineSession<E: InferenceEngine> {
    engine: E,
    conversation: ConversationHandle,
    released: bool,
}

impl<E: InferenceEngine> EngineSession<E> {
    pub fn open<P: AsRef<Path>>(mut engine: E, model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();

        if let Err(e) = engine.init() {
            engine.shutdown();
            return Err(CadenceError::EngineInit(format!("engine init failed: {e}")));
        }
        tracing::info!("🔌 [session] Engine initialized. Loading {}", model_path.display());

        if let Err(e) = engine.load_model(model_path) {
            engine.shutdown();
            return Err(CadenceError::EngineInit(format!(
                "model load failed for {}: {e}",
                model_path.display()
            )));
        }

        let conversation = match engine.start_conversation() {
            Ok(h) => h,
            Err(e) => {
                engine.unload_model();
                engine.shutdown();
                return Err(CadenceError::EngineInit(format!(
                    "could not start a conversation: {e}"
                )));
            }
        };
        tracing::info!(
            "✅ [session] Model loaded, conversation {} ready",
            conversation.raw()
        );

        Ok(Self {
            engine,
            conversation,
            released: false,
        })
    }

    #[inline]
    pub fn conversation(&self) -> ConversationHandle {
        self.conversation
    }

    #[inline]
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Tokenize `prompt` and generate against this session's conversation.
    pub fn generate<F>(
        &mut self,
        controller: &GenerationController,
        prompt: &str,
        max_new_tokens: usize,
        on_token: F,
    ) -> Result<GenerationOutcome>
    where
        F: FnMut(&str),
    {
        let tokens = controller.tokenize(prompt);
        tracing::debug!("🔤 [session] Tokenized input ({} tokens)", tokens.len());
        controller.generate(
            &mut self.engine,
            self.conversation,
            &tokens,
            max_new_tokens,
            on_token,
        )
    }

    /// Release the conversation, the model and the engine now.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.engine.end_conversation(self.conversation);
        self.engine.unload_model();
        self.engine.shutdown();
        tracing::info!("🧹 [session] Conversation {} closed", self.conversation.raw());
    }
}

impl<E: InferenceEngine> Drop for EngineSession<E> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_abi::engine::Scores;
    use cadence_abi::token::Token;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    /// Records lifecycle calls; fails at the configured stage.
    struct Lifecycle {
        log: Log,
        fail_at: Option<&'static str>,
    }

    impl Lifecycle {
        fn hit(&self, op: &'static str) -> std::result::Result<(), String> {
            self.log.borrow_mut().push(op);
            if self.fail_at == Some(op) {
                Err(format!("{op} refused"))
            } else {
                Ok(())
            }
        }
    }

    impl InferenceEngine for Lifecycle {
        fn init(&mut self) -> std::result::Result<(), String> {
            self.hit("init")
        }
        fn shutdown(&mut self) {
            let _ = self.hit("shutdown");
        }
        fn load_model(&mut self, _: &Path) -> std::result::Result<(), String> {
            self.hit("load_model")
        }
        fn unload_model(&mut self) {
            let _ = self.hit("unload_model");
        }
        fn start_conversation(&mut self) -> std::result::Result<ConversationHandle, String> {
            self.hit("start_conversation")?;
            ConversationHandle::new(9).ok_or_else(|| "zero handle".to_string())
        }
        fn end_conversation(&mut self, _: ConversationHandle) {
            let _ = self.hit("end_conversation");
        }
        fn run_step(
            &mut self,
            _: ConversationHandle,
            _: &[Token],
        ) -> std::result::Result<Scores, String> {
            self.hit("run_step")?;
            Ok(Scores::default())
        }
    }

    fn engine(fail_at: Option<&'static str>) -> (Lifecycle, Log) {
        let log = Log::default();
        (
            Lifecycle {
                log: log.clone(),
                fail_at,
            },
            log,
        )
    }

    #[test]
    fn open_then_drop_releases_everything_once() {
        let (e, log) = engine(None);
        let session = EngineSession::open(e, "model.bin").unwrap();
        assert_eq!(session.conversation().raw(), 9);
        drop(session);
        assert_eq!(
            *log.borrow(),
            vec![
                "init",
                "load_model",
                "start_conversation",
                "end_conversation",
                "unload_model",
                "shutdown"
            ]
        );
    }

    #[test]
    fn failed_model_load_is_an_init_error() {
        let (e, log) = engine(Some("load_model"));
        let err = EngineSession::open(e, "missing.bin").err().unwrap();
        assert!(matches!(err, CadenceError::EngineInit(msg) if msg.contains("missing.bin")));
        assert_eq!(*log.borrow(), vec!["init", "load_model", "shutdown"]);
    }

    #[test]
    fn failed_conversation_unloads_the_model() {
        let (e, log) = engine(Some("start_conversation"));
        assert!(EngineSession::open(e, "m.bin").is_err());
        assert_eq!(log.borrow().last().copied(), Some("shutdown"));
        assert!(log.borrow().contains(&"unload_model"));
    }
}
