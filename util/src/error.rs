use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the transport and codec layers.
#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer too short")]
    ErrBufferShort,
    #[error("i/o timeout")]
    ErrTimeout,
    #[error("use of closed connection")]
    ErrUseClosedNetworkConn,
    #[error("connection already closed")]
    ErrAlreadyClosed,
    #[error("no remote address")]
    ErrNoRemAddr,
    /// `marshal_to` wrote a different number of octets than `marshal_size` announced.
    #[error("marshal_to wrote {0} octets, marshal_size announced {1}")]
    ErrMarshalSizeMismatch(usize, usize),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("{0}")]
    Std(#[source] StdError),
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wraps an error raised by a layer above this crate.
    pub fn from_std<T>(error: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Error::Std(StdError(Box::new(error)))
    }

    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        match self {
            Error::Std(StdError(inner)) => inner.downcast_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// io::Error has no PartialEq; the kind is what callers match on.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

/// A boxed error from a higher layer. The codec traits return `util::Error`,
/// so codec crates carry their own error type through here and take it back
/// out with `downcast_ref`.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StdError(pub Box<dyn std::error::Error + Send + Sync>);

impl PartialEq for StdError {
    fn eq(&self, _: &Self) -> bool {
        false
    }
}
