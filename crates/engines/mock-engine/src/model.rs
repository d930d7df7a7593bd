use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::Path,
};

use cadence_abi::{ConversationHandle, InferenceEngine, Scores, Token};
use serde::Deserialize;

/// Model file: every token id predicts one successor.
///
/// ```json
/// { "vocab_size": 5, "transitions": { "1": 4, "4": 3 }, "fallback": 3 }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionModel {
    pub vocab_size: usize,
    #[serde(default)]
    pub transitions: HashMap<i32, i32>,
    pub fallback: i32,
}

impl TransitionModel {
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let model: Self = serde_json::from_str(json).map_err(|e| format!("bad model JSON: {e}"))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), String> {
        if self.vocab_size == 0 {
            return Err("vocab_size must be > 0".into());
        }
        let in_range = |id: i32| id >= 0 && (id as usize) < self.vocab_size;
        if !in_range(self.fallback) {
            return Err(format!("fallback {} outside vocabulary", self.fallback));
        }
        if let Some((from, to)) = self.transitions.iter().find(|(_, to)| !in_range(**to)) {
            return Err(format!("transition {from} -> {to} outside vocabulary"));
        }
        Ok(())
    }

    fn successor(&self, token: Token) -> usize {
        self.transitions.get(&token.0).copied().unwrap_or(self.fallback) as usize
    }
}

/// One-hot scores, one row per input token.
#[derive(Debug, Default)]
pub struct MockEngine {
    ready: bool,
    model: Option<TransitionModel>,
    open: BTreeSet<u64>,
    next_handle: u64,
}

impl MockEngine {
    pub const fn new() -> Self {
        Self {
            ready: false,
            model: None,
            open: BTreeSet::new(),
            next_handle: 0,
        }
    }
}

impl InferenceEngine for MockEngine {
    fn init(&mut self) -> Result<(), String> {
        self.ready = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        *self = Self::new();
    }

    fn load_model(&mut self, path: &Path) -> Result<(), String> {
        if !self.ready {
            return Err("engine not initialized".into());
        }
        let text =
            fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        self.model = Some(TransitionModel::from_json_str(&text)?);
        Ok(())
    }

    fn unload_model(&mut self) {
        self.model = None;
        self.open.clear();
    }

    fn start_conversation(&mut self) -> Result<ConversationHandle, String> {
        if self.model.is_none() {
            return Err("no model loaded".into());
        }
        self.next_handle += 1;
        self.open.insert(self.next_handle);
        ConversationHandle::new(self.next_handle).ok_or_else(|| "handle overflow".to_string())
    }

    fn end_conversation(&mut self, handle: ConversationHandle) {
        self.open.remove(&handle.raw());
    }

    fn run_step(&mut self, handle: ConversationHandle, tokens: &[Token]) -> Result<Scores, String> {
        let model = self.model.as_ref().ok_or("no model loaded")?;
        if !self.open.contains(&handle.raw()) {
            return Err(format!("conversation {} is not open", handle.raw()));
        }
        if tokens.is_empty() {
            return Err("empty step".into());
        }

        let width = model.vocab_size;
        let mut values = vec![0.0f32; width * tokens.len()];
        for (row, &tok) in tokens.iter().enumerate() {
            values[row * width + model.successor(tok)] = 1.0;
        }
        Ok(Scores::new(values, tokens.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{ "vocab_size": 5, "transitions": { "1": 4, "4": 3 }, "fallback": 3 }"#;

    fn ready_engine() -> (MockEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, MODEL).unwrap();
        let mut engine = MockEngine::new();
        engine.init().unwrap();
        engine.load_model(&path).unwrap();
        (engine, dir)
    }

    #[test]
    fn rows_follow_the_transition_table() {
        let (mut engine, _dir) = ready_engine();
        let conv = engine.start_conversation().unwrap();
        let scores = engine.run_step(conv, &[Token(1), Token(4)]).unwrap();
        assert_eq!(scores.positions(), 2);
        assert_eq!(scores.last_position(), &[0.0, 0.0, 0.0, 1.0, 0.0]);

        let scores = engine.run_step(conv, &[Token(2)]).unwrap();
        assert_eq!(scores.last_position()[3], 1.0); // fallback
    }

    #[test]
    fn lifecycle_is_enforced() {
        let mut engine = MockEngine::new();
        assert!(engine.load_model(Path::new("model.json")).is_err());
        engine.init().unwrap();
        assert!(engine.start_conversation().is_err());

        let (mut engine, _dir) = ready_engine();
        let conv = engine.start_conversation().unwrap();
        engine.end_conversation(conv);
        assert!(engine.run_step(conv, &[Token(1)]).is_err());
    }

    #[test]
    fn rejects_out_of_range_models() {
        let err = TransitionModel::from_json_str(r#"{ "vocab_size": 2, "fallback": 5 }"#).unwrap_err();
        assert!(err.contains("fallback"), "{err}");
        assert!(TransitionModel::from_json_str(r#"{ "vocab_size": 0, "fallback": 0 }"#).is_err());
    }
}
