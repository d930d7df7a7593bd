use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::path::Path;

use crate::token::Token;

/// Opaque reference to engine-owned per-conversation state (attention/KV cache).
///
/// Zero is the failure value at the C boundary, so a live handle is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationHandle(NonZeroU64);

impl ConversationHandle {
    /// `None` for the raw failure value `0`.
    #[inline]
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

/// Scores returned by one forward evaluation.
///
/// `values` is row-major, `positions` rows of vocabulary-sized score vectors.
/// The controller only reads the last row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scores {
    values: Vec<f32>,
    positions: usize,
}

impl Scores {
    pub fn new(values: Vec<f32>, positions: usize) -> Self {
        Self { values, positions }
    }

    /// A single position's score vector.
    pub fn single(values: Vec<f32>) -> Self {
        let positions = usize::from(!values.is_empty());
        Self { values, positions }
    }

    #[inline]
    pub fn positions(&self) -> usize {
        self.positions
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() || self.positions == 0
    }

    /// Row width, if the buffer splits into `positions` equal rows.
    fn row_width(&self) -> Option<usize> {
        if self.is_empty() || self.values.len() % self.positions != 0 {
            return None;
        }
        Some(self.values.len() / self.positions)
    }

    /// Row-major buffer, for handing across the C boundary.
    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Score vector of the last produced position. Empty if the buffer is empty
    /// or its length is not a whole number of rows.
    pub fn last_position(&self) -> &[f32] {
        match self.row_width() {
            Some(width) => &self.values[self.values.len() - width..],
            None => &[],
        }
    }
}

/// Engine-agnostic interface for the foreign inference engine.
///
/// Exactly the lifecycle + step operations the controller relies on; the
/// numeric forward pass, weights and caches all live behind it.
pub trait InferenceEngine {
    /// Allocate engine-wide resources. Must run once before anything else.
    fn init(&mut self) -> Result<(), String>;

    /// Release engine-wide resources. Safe to call without a prior successful `init`.
    fn shutdown(&mut self);

    fn load_model(&mut self, path: &Path) -> Result<(), String>;

    fn unload_model(&mut self);

    /// Allocate per-conversation state.
    fn start_conversation(&mut self) -> Result<ConversationHandle, String>;

    /// Release per-conversation state; the handle must not be used afterwards.
    fn end_conversation(&mut self, handle: ConversationHandle);

    /// One forward evaluation of `tokens` in the context of `handle`.
    fn run_step(&mut self, handle: ConversationHandle, tokens: &[Token]) -> Result<Scores, String>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn init(&mut self) -> Result<(), String> {
        (**self).init()
    }
    fn shutdown(&mut self) {
        (**self).shutdown()
    }
    fn load_model(&mut self, path: &Path) -> Result<(), String> {
        (**self).load_model(path)
    }
    fn unload_model(&mut self) {
        (**self).unload_model()
    }
    fn start_conversation(&mut self) -> Result<ConversationHandle, String> {
        (**self).start_conversation()
    }
    fn end_conversation(&mut self, handle: ConversationHandle) {
        (**self).end_conversation(handle)
    }
    fn run_step(&mut self, handle: ConversationHandle, tokens: &[Token]) -> Result<Scores, String> {
        (**self).run_step(handle, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_handle() {
        assert!(ConversationHandle::new(0).is_none());
        assert_eq!(ConversationHandle::new(42).map(|h| h.raw()), Some(42));
    }

    #[test]
    fn last_position_takes_the_final_row() {
        let s = Scores::new(vec![0.0, 1.0, 2.0, 9.0, 8.0, 7.0], 2);
        assert_eq!(s.last_position(), &[9.0, 8.0, 7.0]);
    }

    #[test]
    fn empty_buffers_have_no_last_position() {
        assert!(Scores::single(vec![]).last_position().is_empty());
        assert!(Scores::new(vec![1.0, 2.0], 0).last_position().is_empty());
        assert_eq!(Scores::single(vec![1.0, 2.0]).positions(), 1);
    }

    #[test]
    fn ragged_buffers_have_no_last_position() {
        let s = Scores::new(vec![0.0, 0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0, 9.0, 5.0], 3);
        assert!(s.last_position().is_empty());
        assert_eq!(Scores::new(vec![1.0; 9], 3).last_position().len(), 3);
    }
}
