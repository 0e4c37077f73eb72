use crate::StatusCode;
use std::{error, fmt, io};

/// Everything that can end a connection before a handler runs.
///
/// Framing errors are answered with a fixed error response. Transport
/// failures and resource exhaustion close the socket without one.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    EmptyRequest,
    InvalidRequestLine,
    InvalidHeader,
    InvalidContentLength,
    BodyMismatch {
        expected: usize,
        available: usize,
    },
    InvalidMultipart,

    LengthRequired,
    HeaderTooLarge,

    RequestTooLarge,
    Io(IoError),
}

macro_rules! http_errors {
    ($($status:ident => $line:literal; )*) => {
        /// Fixed response for the error, `None` when the connection
        /// must be closed without writing anything.
        pub(crate) const fn as_http(&self) -> Option<&'static [u8]> {
            match self.status() { $(
                Some(StatusCode::$status) => Some(concat!(
                    "HTTP/1.1 ", $line, "\r\n",
                    "Content-Length: 0\r\n\r\n",
                ).as_bytes()),
            )*
                _ => None,
            }
        }
    };
}

impl ErrorKind {
    /// Status the error is answered with.
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::EmptyRequest
            | Self::InvalidRequestLine
            | Self::InvalidHeader
            | Self::InvalidContentLength
            | Self::BodyMismatch { .. }
            | Self::InvalidMultipart => Some(StatusCode::BadRequest),

            Self::LengthRequired => Some(StatusCode::LengthRequired),
            Self::HeaderTooLarge => Some(StatusCode::RequestHeaderFieldsTooLarge),

            Self::RequestTooLarge | Self::Io(_) => None,
        }
    }

    http_errors! {
        BadRequest => "400 Bad Request";
        LengthRequired => "411 Length Required";
        RequestHeaderFieldsTooLarge => "431 Request Header Fields Too Large";
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

/// Transport failure, compared by [`io::ErrorKind`].
#[derive(Debug)]
pub struct IoError(pub(crate) io::Error);

impl IoError {
    #[inline]
    pub fn kind(&self) -> io::ErrorKind {
        self.0.kind()
    }
}

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}
