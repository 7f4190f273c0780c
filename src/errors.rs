use crate::directory::Lookup;
use crate::response::ApiError;

/// All error types that can occur when talking to a bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// The bridge answered with something that is not the JSON we expected.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A UDP socket operation failed during discovery.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// The request never produced a response (connection refused, HTTP failure).
    #[error("transport {action} error: {reason}")]
    Transport { action: String, reason: String },

    /// The request did not complete within the configured timeout.
    #[error("request to {path} timed out")]
    Timeout { path: String },

    /// The bridge refused the request as a whole.
    #[error("{0}")]
    Api(ApiError),

    /// The bridge applied part of a write and rejected the listed fields.
    ///
    /// The accepted fields have already been reconciled; the rejected ones
    /// stay dirty and will be resent by the next write.
    #[error("bridge rejected {} field(s) of {device}", errors.len())]
    Rejected {
        device: String,
        errors: Vec<ApiError>,
    },

    /// No light matched the lookup.
    #[error("light not found: {0}")]
    LightNotFound(Lookup),

    /// No group matched the lookup.
    #[error("group not found: {0}")]
    GroupNotFound(Lookup),

    /// The bridge was shut down before a queued command completed.
    #[error("command abandoned; bridge was shut down")]
    Abandoned,

    /// A command was submitted from outside any async runtime and the bridge
    /// was not created inside one either, so nothing could dispatch it.
    ///
    /// Nothing was sent; dirty fields are untouched.
    #[error("no async runtime to dispatch commands on")]
    NoRuntime,

    /// The bridge reply was valid JSON but not shaped as expected.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new transport error
    pub fn transport(action: &str, reason: impl ToString) -> Self {
        Error::Transport {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new timeout error
    pub fn timeout(path: &str) -> Self {
        Error::Timeout {
            path: path.to_string(),
        }
    }

    /// Create a new rejected-fields error
    pub fn rejected(device: &str, errors: Vec<ApiError>) -> Self {
        Error::Rejected {
            device: device.to_string(),
            errors,
        }
    }

    /// True for failures where the request may never have reached the bridge.
    ///
    /// Dirty state is untouched in these cases, so retrying the same write is
    /// safe.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::Timeout { .. } | Error::JsonLoad(_)
        )
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
