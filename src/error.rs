//! Unified error type.

/// The error type returned by relaymux's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// startup misconfiguration and infrastructure failures. Every variant except
/// [`Error::ServerClosed`] is fatal for the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The server was shut down. Returned by the accept loop after a normal
    /// stop and by a second shutdown call.
    #[error("server closed")]
    ServerClosed,

    #[error("can not find auth middleware `{name}` for {method} {path}")]
    MissingAuth {
        name: String,
        method: String,
        path: String,
    },

    #[error("unknown method `{method}` for route `{path}`")]
    UnknownMethod { method: String, path: String },

    #[error("invalid route `{path}`: {source}")]
    Route {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("config `{key}`: {reason}")]
    Config { key: &'static str, reason: String },

    #[error("task: {0}")]
    Task(#[from] tokio::task::JoinError),
}
