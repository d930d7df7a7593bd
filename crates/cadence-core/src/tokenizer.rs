//! Whitespace tokenizer and per-id detokenizer.
//!
//! Word-level only: lowercase, trim, split on whitespace runs. No subword merging.
//! Only ASCII whitespace separates words; U+00A0 and friends stay inside a word.

use cadence_abi::token::Token;

use crate::config::UnknownDisplay;
use crate::vocab::Vocabulary;

/// `[bos?] ++ id_of(word)*` for every whitespace-separated word of `text`.
pub fn tokenize(vocab: &Vocabulary, text: &str) -> Vec<Token> {
    let lowered = text.to_lowercase();
    let words = lowered
        .trim_matches(|c: char| c <= ' ')
        .split(is_separator)
        .filter(|w| !w.is_empty());

    let bos = vocab.specials().bos;
    let mut ids = Vec::with_capacity(usize::from(bos.is_some()) + words.clone().count());
    ids.extend(bos);
    ids.extend(words.map(|w| vocab.id_of(w)));
    ids
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

/// Visible text for one id. BOS renders empty; unmapped ids follow `display`.
pub fn detokenize(vocab: &Vocabulary, id: Token, display: UnknownDisplay) -> &str {
    if vocab.specials().bos == Some(id) {
        return "";
    }
    match (vocab.token_of(id), display) {
        (Some(s), _) => s,
        (None, UnknownDisplay::Empty) => "",
        (None, UnknownDisplay::Marker) => UnknownDisplay::MARKER,
    }
}
