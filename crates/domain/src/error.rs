/// Shared error type used across all Steer crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No session, or no problem, for the calling owner.
    #[error("{0}")]
    NotFound(String),

    #[error("Could not find method named {name}. Available methods are {available:?}")]
    UnknownMethod {
        name: String,
        available: Vec<String>,
    },

    #[error("incompatible problem type: {0}")]
    IncompatibleProblemType(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("The method has no last request defined.")]
    NoPendingRequest,

    #[error("Preference type index '{0}' not valid.")]
    PreferenceIndexOutOfRange(i64),

    /// The index was valid but the payload did not have the expected shape.
    #[error("invalid preference: {0}")]
    InvalidPreference(String),

    /// Raised by an engine when it rejects a response. The controller turns
    /// this into [`Error::Iteration`] once it knows the pending request.
    #[error("engine: {0}")]
    Engine(String),

    #[error("Could not iterate the method with the given response: {message}")]
    Iteration {
        message: String,
        last_request: serde_json::Value,
    },

    /// A stored snapshot could not be restored. Fatal for that session.
    #[error("snapshot: {0}")]
    Serialization(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
