use std::{error, fmt, sync::Arc};

use arcstr::ArcStr;
use redis::RedisError;

/// An enum of all error kinds.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The key is empty, longer than 250 bytes or contains whitespace or
    /// control characters.
    MalformedKey,
    /// The requested key is not held by the server.
    NotFound,
    /// A conditional write (add or replace) was rejected because the key
    /// did or did not already exist.
    NotStored,
    /// The operation has no counterpart on the backend.
    UnsupportedOperation,
    /// The backend client failed. The original `RedisError` is available
    /// through `Error::source`.
    BackendFailure,
    /// An error that was caused because the configuration passed to the
    /// client was wrong.
    InvalidConfig,
    /// The connection was already released or is no longer usable.
    ConnectionClosed,
    /// No connection could be taken from the pool in time.
    PoolExhausted,
    /// The deadline of the calling context passed before the command was sent.
    DeadlineExceeded,
    /// The calling context was canceled before the command was sent.
    Canceled,
    /// A stored item could not be converted into the requested type.
    Decode,
}

/// Represents a tagcache error.
///
/// Errors are cheap to clone, which lets a cursor hand the same terminal
/// error back on every call after it failed.
#[derive(Clone)]
pub struct TagcacheError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, ArcStr),
    Backend(Arc<RedisError>),
}

/// Library generic result type.
pub type TagcacheResult<T> = Result<T, TagcacheError>;

impl PartialEq for TagcacheError {
    fn eq(&self, other: &TagcacheError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Backend(a), ErrorRepr::Backend(b)) => **a == **b,
            (ErrorRepr::Backend(_), _) | (_, ErrorRepr::Backend(_)) => false,
            _ => self.kind() == other.kind(),
        }
    }
}

impl From<RedisError> for TagcacheError {
    fn from(err: RedisError) -> TagcacheError {
        TagcacheError {
            repr: ErrorRepr::Backend(Arc::new(err)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for TagcacheError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> TagcacheError {
        TagcacheError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for TagcacheError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> TagcacheError {
        TagcacheError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail.into()),
        }
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for TagcacheError {
    fn from(err: serde_json::Error) -> TagcacheError {
        TagcacheError::from((ErrorKind::Decode, "invalid json payload", err.to_string()))
    }
}

impl error::Error for TagcacheError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Backend(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Debug for TagcacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for TagcacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str("tagcache: ")?;
        self.fmt_message(f)
    }
}

impl TagcacheError {
    fn fmt_message(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::WithDescription(_, desc) => f.write_str(desc),
            ErrorRepr::WithDescriptionAndDetail(_, desc, detail) => {
                f.write_str(desc)?;
                f.write_str(": ")?;
                f.write_str(detail)
            }
            ErrorRepr::Backend(err) => fmt::Display::fmt(err.as_ref(), f),
        }
    }

    /// Re-describes the error, keeping its kind and naming the key it
    /// happened on.
    pub(crate) fn context(self, desc: &'static str, key: &str) -> TagcacheError {
        struct Message<'a>(&'a TagcacheError);

        impl fmt::Display for Message<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
                self.0.fmt_message(f)
            }
        }

        TagcacheError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                self.kind(),
                desc,
                format!("{key}: {}", Message(&self)).into(),
            ),
        }
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => *kind,
            ErrorRepr::Backend(_) => ErrorKind::BackendFailure,
        }
    }

    /// Returns the error detail.
    pub fn detail(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, detail) => Some(detail.as_str()),
            ErrorRepr::Backend(err) => err.detail(),
            ErrorRepr::WithDescription(_, _) => None,
        }
    }

    /// Returns the backend error this error wraps, if any.
    pub fn backend_error(&self) -> Option<&RedisError> {
        match &self.repr {
            ErrorRepr::Backend(err) => Some(err),
            _ => None,
        }
    }

    /// Indicates that the key was rejected before reaching the backend.
    pub fn is_malformed_key(&self) -> bool {
        self.kind() == ErrorKind::MalformedKey
    }

    /// Indicates that the requested key does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Indicates that the failure came from the backend client.
    pub fn is_backend_failure(&self) -> bool {
        self.kind() == ErrorKind::BackendFailure
    }

    /// Returns true if the calling context ran out of time or was canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DeadlineExceeded | ErrorKind::Canceled
        )
    }

    /// Indicates that the backend connection is unusable, meaning a
    /// fresh one should be acquired before trying again.
    pub fn is_unrecoverable_error(&self) -> bool {
        match &self.repr {
            ErrorRepr::Backend(err) => err.is_unrecoverable_error(),
            _ => self.kind() == ErrorKind::ConnectionClosed,
        }
    }
}

pub(crate) fn malformed_key() -> TagcacheError {
    TagcacheError::from((
        ErrorKind::MalformedKey,
        "malformed key is too long or contains invalid characters",
    ))
}

pub(crate) fn not_found() -> TagcacheError {
    TagcacheError::from((ErrorKind::NotFound, "key not found"))
}

pub(crate) fn unsupported_operation(operation: &str) -> TagcacheError {
    TagcacheError::from((
        ErrorKind::UnsupportedOperation,
        "invalid command operation",
        operation.to_string(),
    ))
}

pub(crate) fn connection_closed() -> TagcacheError {
    TagcacheError::from((ErrorKind::ConnectionClosed, "connection closed"))
}
