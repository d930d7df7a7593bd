use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use cadence_core::{EngineSession, GenerationController, GenerationOutcome, InferenceEngine};

use crate::errlog;

const PROMPT: &str = "> ";
const QUIT: &str = "/quit";

/// Generate for one prompt, streaming fragments to `out` as they arrive.
pub fn run_once<E, W>(
    session: &mut EngineSession<E>,
    controller: &GenerationController,
    prompt: &str,
    max_new_tokens: usize,
    out: &mut W,
) -> Result<GenerationOutcome>
where
    E: InferenceEngine,
    W: Write,
{
    let mut write_err: Option<io::Error> = None;
    let outcome = session.generate(controller, prompt, max_new_tokens, |fragment| {
        if write_err.is_some() || fragment.is_empty() {
            return;
        }
        let res = write!(out, "{fragment} ").and_then(|_| out.flush());
        if let Err(e) = res {
            write_err = Some(e);
        }
    })?;

    if let Some(e) = write_err {
        return Err(e).context("writing generated text");
    }
    writeln!(out)?;
    tracing::info!(
        "🏁 [repl] {} ({} tokens, {} engine calls)",
        outcome.stop,
        outcome.emitted,
        outcome.engine_calls
    );
    Ok(outcome)
}

/// Read prompts line by line until EOF or `/quit`.
///
/// A failed request is logged and the loop moves on to the next line.
pub fn run_repl<E, R, W>(
    session: &mut EngineSession<E>,
    controller: &GenerationController,
    max_new_tokens: usize,
    input: R,
    out: &mut W,
) -> Result<()>
where
    E: InferenceEngine,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            return Ok(());
        };
        let line = line.context("reading prompt")?;
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt == QUIT {
            return Ok(());
        }

        if let Err(e) = run_once(session, controller, prompt, max_new_tokens, out) {
            tracing::warn!("⚠️ [repl] generation failed: {e:#}");
            errlog::record("generate", &e);
            writeln!(out, "[error] {e}")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{
        ControllerConfig, ConversationHandle, Scores, StopReason, Token, Vocabulary,
    };
    use std::io::Cursor;
    use std::path::Path;

    /// Answers "hi" to anything except "hi", which it closes with EOS.
    struct Echo;

    impl InferenceEngine for Echo {
        fn init(&mut self) -> std::result::Result<(), String> {
            Ok(())
        }
        fn shutdown(&mut self) {}
        fn load_model(&mut self, _path: &Path) -> std::result::Result<(), String> {
            Ok(())
        }
        fn unload_model(&mut self) {}
        fn start_conversation(&mut self) -> std::result::Result<ConversationHandle, String> {
            Ok(ConversationHandle::new(1).unwrap())
        }
        fn end_conversation(&mut self, _handle: ConversationHandle) {}
        fn run_step(
            &mut self,
            _handle: ConversationHandle,
            tokens: &[Token],
        ) -> std::result::Result<Scores, String> {
            let mut v = vec![0.0; 5];
            let pick = if tokens.last() == Some(&Token(4)) { 3 } else { 4 };
            v[pick] = 1.0;
            Ok(Scores::single(v))
        }
    }

    fn fixture() -> (EngineSession<Echo>, GenerationController) {
        let vocab = Vocabulary::from_json_str(
            r#"{"<pad>":0,"<bos>":1,"<unk>":2,"<eos>":3,"hi":4}"#,
            &ControllerConfig::default(),
        )
        .unwrap();
        let controller = GenerationController::new(vocab, ControllerConfig::default());
        let session = EngineSession::open(Echo, "model.bin").unwrap();
        (session, controller)
    }

    #[test]
    fn one_shot_streams_fragments() {
        let (mut session, controller) = fixture();
        let mut out = Vec::new();
        let outcome = run_once(&mut session, &controller, "Hello", 10, &mut out).unwrap();
        assert_eq!(outcome.stop, StopReason::EndOfSequence);
        assert_eq!(String::from_utf8(out).unwrap(), "hi \n");
    }

    #[test]
    fn repl_skips_blank_lines_and_quits() {
        let (mut session, controller) = fixture();
        let input = Cursor::new("\n   \nhello\n/quit\nnever\n");
        let mut out = Vec::new();
        run_repl(&mut session, &controller, 10, input, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "> > > hi \n> ");
    }

    #[test]
    fn repl_ends_on_eof() {
        let (mut session, controller) = fixture();
        let mut out = Vec::new();
        run_repl(&mut session, &controller, 10, Cursor::new(""), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "> \n");
    }
}
