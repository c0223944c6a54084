use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    InvalidFilter,
    NotFound,
    Forbidden,
    Unauthorized,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// Wire code emitted in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::InvalidFilter => "invalid_filter",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
    /// Byte offset into the offending input, set for filter errors
    pub position: Option<usize>,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: context.into(),
            position: None,
        }
    }

    pub fn invalid_request(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidRequest, context)
    }

    pub fn invalid_filter(position: usize, context: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::InvalidFilter,
            context: context.into(),
            position: Some(position),
        }
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context)
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Internal, context)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{}: {} (at byte {})", self.kind.code(), self.context, pos),
            None => write!(f, "{}: {}", self.kind.code(), self.context),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Internal, err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::InvalidRequest, err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::new(ErrorKind::Internal, format!("store error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
