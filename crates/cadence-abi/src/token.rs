use serde::{Deserialize, Serialize};
use std::fmt;

/// Wrapper for a vocabulary id. Using a newtype avoids accidental
/// mixing with score indices and step counters, and keeps conversions explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub i32);

// i32 matches what engines take across the C boundary. Vocabulary ids are
// never negative; a negative value only ever appears as an error code there.

impl Token {
    /// Build a token from a score-vector index, if it fits the id range.
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        i32::try_from(index).ok().map(Token)
    }

    /// Raw id as passed to the engine.
    #[inline]
    pub fn id(self) -> i32 {
        self.0
    }
}

impl From<i32> for Token {
    #[inline]
    fn from(value: i32) -> Self {
        Token(value)
    }
}

impl From<Token> for i32 {
    #[inline]
    fn from(token: Token) -> i32 {
        token.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_index_rejects_ids_past_i32() {
        assert_eq!(Token::from_index(7), Some(Token(7)));
        assert_eq!(Token::from_index(i32::MAX as usize + 1), None);
    }

    #[test]
    fn display_and_raw_id() {
        let t = Token(5);
        assert_eq!(t.id(), 5);
        assert_eq!(format!("{t}"), "#5");
        assert_eq!(i32::from(t), 5);
    }
}
