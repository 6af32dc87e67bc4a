use crate::http::query;
use std::{error, fmt, io};

/// Why a connection was abandoned. None of these reach the wire: a failed
/// request is logged and the socket is closed without a response.
#[derive(Debug, PartialEq)]
pub(crate) enum ErrorKind {
    MalformedRequestLine,

    MissingHeaderTerminator,
    InvalidContentLength,
    IncompleteBody {
        expected: usize,
        received: usize,
    },
    RequestTooLarge(usize),

    MultipartBoundaryMissing,
    Query(query::Error),

    Io(IoError),
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<query::Error> for ErrorKind {
    fn from(err: query::Error) -> Self {
        ErrorKind::Query(err)
    }
}
impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}
