use std::path::PathBuf;
use thiserror::Error;

/// Vocabulary / tokenizer resource could not be turned into a `Vocabulary`.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("resource is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("resource is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported resource shape: {0}")]
    Shape(String),

    #[error("token {token:?} has a non-integer id")]
    NonIntegerId { token: String },

    #[error("token {token:?} has negative id {id}")]
    NegativeId { token: String, id: i64 },

    #[error("id {id} is mapped by both {first:?} and {second:?}")]
    DuplicateId {
        id: i32,
        first: String,
        second: String,
    },

    #[error("added token {token:?} (id {id}) conflicts with the base vocabulary")]
    ConflictingAddedToken { token: String, id: i32 },
}

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("vocabulary resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("engine initialization failed: {0}")]
    EngineInit(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("panic occurred during {0}")]
    Panicked(&'static str),
}

pub type Result<T> = std::result::Result<T, CadenceError>;
