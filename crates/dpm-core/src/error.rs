//! Error types for datapack loading, configuration parsing, and edits.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The archive has no readable `pack.mcmeta`.
    #[error("{path}: not a datapack (missing or unreadable pack.mcmeta)")]
    NotADatapack { path: String },

    #[error("{pack}: bad configuration: {reason}")]
    BadConfig { pack: String, reason: String },

    #[error("transformer is missing or null")]
    UndefinedTransformer,

    #[error("unknown transformer function \"{0}\"")]
    UnknownFunction(String),

    #[error("unknown conditional operator \"{0}\"")]
    UnknownOperator(String),

    #[error("unrecognized transformer shape: {0}")]
    BadTransformer(String),

    /// A transformer referenced the method input, but the method was
    /// evaluated without one.
    #[error("transformer references the method input but no input was given")]
    MissingInput,

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{pack}:{file}: malformed JSON: {source}")]
    MalformedJson {
        pack: String,
        file: String,
        source: serde_json::Error,
    },

    #[error("value path \"{pointer}\" does not exist")]
    PathNotFound { pointer: String },

    #[error("value at \"{pointer}\" is not a sequence")]
    NotASequence { pointer: String },

    /// Internal guard: a first write into the patch cache collided with an
    /// existing entry without overwrite permission.
    #[error("{pack}:{file}: refusing to overwrite cached file")]
    CacheCollision { pack: String, file: String },
}
