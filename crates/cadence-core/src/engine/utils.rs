use cadence_abi::engine::Scores;
use cadence_abi::token::Token;

/// Index of the largest score; the first occurrence wins ties. `None` if empty.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let (first, rest) = scores.split_first()?;
    let mut best = (0, *first);
    for (i, &s) in rest.iter().enumerate() {
        if s > best.1 {
            best = (i + 1, s);
        }
    }
    Some(best.0)
}

/// Greedy pick over the last position. `None` means the step produced nothing usable.
pub(super) fn select_next(scores: &Scores) -> Option<Token> {
    argmax(scores.last_position()).and_then(Token::from_index)
}
