use std::fmt;

/// Library-level error type.
///
/// Binaries under `src/bin/` work in terms of `anyhow::Result` and wrap
/// values of this type with `anyhow::Context`; the engines themselves never
/// depend on `anyhow`.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Error surfaced across the Reader/Writer boundary.
    Storage(Box<dyn std::error::Error + Send + Sync>),
    /// Invalid configuration caught before any engine starts.
    Configuration(&'static str),
    /// A topic's message type could not be resolved or published.
    TopicUnsupported(&'static str),
    Corrupt(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Storage(err) => write!(f, "storage error: {err}"),
            Error::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Error::TopicUnsupported(msg) => write!(f, "topic unsupported: {msg}"),
            Error::Corrupt(msg) => write!(f, "corrupt data: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Storage(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
