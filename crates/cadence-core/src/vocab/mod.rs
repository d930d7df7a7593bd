//! Vocabulary store: immutable token ↔ id mapping plus resolved special tokens.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use cadence_abi::token::Token;

use crate::config::ControllerConfig;
use crate::error::ResourceError;

mod load;

/// Well-known ids, resolved once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub bos: Option<Token>,
    pub eos: Option<Token>,
    /// Always set: falls back to `ControllerConfig::unknown_id`.
    pub unknown: Token,
}

#[derive(Debug, Clone)]
pub struct Vocabulary {
    string_to_id: HashMap<String, Token>,
    id_to_string: BTreeMap<Token, String>,
    specials: SpecialTokens,
}

impl Vocabulary {
    /// Parse a `vocab.json` (flat) or `tokenizer.json` (nested `model.vocab`) text.
    pub fn from_json_str(json: &str, cfg: &ControllerConfig) -> Result<Self, ResourceError> {
        let root: serde_json::Value = serde_json::from_str(json)?;
        let raw = load::extract(&root)?;
        let mut vocab = Self::from_entries(raw.base, cfg)?;
        if !raw.added.is_empty() {
            vocab.merge_added(raw.added)?;
            vocab.specials = vocab.resolve_specials(cfg);
        }
        Ok(vocab)
    }

    /// Same as `from_json_str`, for raw resource bytes (must be UTF-8).
    pub fn from_slice(bytes: &[u8], cfg: &ControllerConfig) -> Result<Self, ResourceError> {
        let text = std::str::from_utf8(bytes)?;
        Self::from_json_str(text, cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P, cfg: &ControllerConfig) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ResourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let vocab = Self::from_slice(&bytes, cfg)?;
        tracing::info!(
            "📖 [vocab] loaded {} tokens from {} (bos={:?}, eos={:?}, unk={})",
            vocab.len(),
            path.display(),
            vocab.specials.bos,
            vocab.specials.eos,
            vocab.specials.unknown
        );
        Ok(vocab)
    }

    /// Build from `(token, id)` pairs. Ids must be unique and non-negative.
    pub fn from_entries<I>(entries: I, cfg: &ControllerConfig) -> Result<Self, ResourceError>
    where
        I: IntoIterator<Item = (String, i32)>,
    {
        let mut string_to_id = HashMap::new();
        let mut id_to_string: BTreeMap<Token, String> = BTreeMap::new();

        for (token, id) in entries {
            if id < 0 {
                return Err(ResourceError::NegativeId {
                    token,
                    id: i64::from(id),
                });
            }
            let id = Token(id);
            if let Some(first) = id_to_string.get(&id) {
                return Err(ResourceError::DuplicateId {
                    id: id.0,
                    first: first.clone(),
                    second: token,
                });
            }
            // A repeated string would leave an orphaned id behind.
            if let Some(prev) = string_to_id.insert(token.clone(), id) {
                return Err(ResourceError::DuplicateId {
                    id: prev.0,
                    first: token.clone(),
                    second: token,
                });
            }
            id_to_string.insert(id, token);
        }

        let mut vocab = Self {
            string_to_id,
            id_to_string,
            specials: SpecialTokens {
                bos: None,
                eos: None,
                unknown: Token(cfg.unknown_id),
            },
        };
        vocab.specials = vocab.resolve_specials(cfg);
        Ok(vocab)
    }

    fn merge_added(&mut self, added: Vec<(String, i32)>) -> Result<(), ResourceError> {
        for (token, id) in added {
            let id = Token(id);
            let by_token = self.string_to_id.get(&token).copied();
            let by_id = self.id_to_string.get(&id);
            match (by_token, by_id) {
                (Some(existing), _) if existing == id => continue,
                (None, None) => {
                    self.string_to_id.insert(token.clone(), id);
                    self.id_to_string.insert(id, token);
                }
                _ => return Err(ResourceError::ConflictingAddedToken { token, id: id.0 }),
            }
        }
        Ok(())
    }

    fn resolve_specials(&self, cfg: &ControllerConfig) -> SpecialTokens {
        SpecialTokens {
            bos: self.resolve_special(&cfg.bos_candidates),
            eos: self.resolve_special(&cfg.eos_candidates),
            unknown: self
                .resolve_special(&cfg.unk_candidates)
                .unwrap_or(Token(cfg.unknown_id)),
        }
    }

    // ─────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────

    /// Mapped id, or the unknown id. Never fails.
    #[inline]
    pub fn id_of(&self, token: &str) -> Token {
        self.string_to_id
            .get(token)
            .copied()
            .unwrap_or(self.specials.unknown)
    }

    #[inline]
    pub fn token_of(&self, id: Token) -> Option<&str> {
        self.id_to_string.get(&id).map(String::as_str)
    }

    /// First candidate name present in the vocabulary, in order.
    pub fn resolve_special<S: AsRef<str>>(&self, candidates: &[S]) -> Option<Token> {
        candidates
            .iter()
            .find_map(|name| self.string_to_id.get(name.as_ref()).copied())
    }

    #[inline]
    pub fn contains(&self, token: &str) -> bool {
        self.string_to_id.contains_key(token)
    }

    #[inline]
    pub fn specials(&self) -> SpecialTokens {
        self.specials
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.id_to_string.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id_to_string.is_empty()
    }

    /// All `(id, token)` pairs, ascending by id.
    pub fn iter(&self) -> impl Iterator<Item = (Token, &str)> {
        self.id_to_string.iter().map(|(id, s)| (*id, s.as_str()))
    }
}
