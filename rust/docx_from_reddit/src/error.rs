use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a conversion. None of these are recovered from:
/// the first error unwinds the whole traversal.
#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP {status} while retrieving {url}")]
    Fetch { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("could not resolve depth of deleted ancestor {id}")]
    UnresolvedAncestor {
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("malformed load-more marker: {0}")]
    MalformedBatchMarker(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("thread page has no {0}")]
    MissingElement(&'static str),
}
