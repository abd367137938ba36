// src/a2s/error.rs
use std::fmt;
use std::io;

/// Per-host query failures. `NoPlayers` and `NoRules` are legitimate empty
/// answers and are never retried.
#[derive(Debug)]
pub enum QueryError {
    HostConnection(io::Error),
    DataTransmit(io::Error),
    BadHeader,
    BadChallengeResponse,
    NoInfo,
    NoPlayers,
    NoRules,
    UnsupportedTitle(u16),
    Truncated,
    SplitResponse,
}

impl QueryError {
    pub fn is_expected_empty(&self) -> bool {
        matches!(self, Self::NoPlayers | Self::NoRules)
    }

    pub(crate) fn timed_out() -> Self {
        Self::DataTransmit(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostConnection(e) => write!(f, "Could not connect to host: {}", e),
            Self::DataTransmit(e) => write!(f, "Error sending or receiving data: {}", e),
            Self::BadHeader => write!(f, "Response had an unexpected header"),
            Self::BadChallengeResponse => write!(f, "Invalid challenge response"),
            Self::NoInfo => write!(f, "Server returned no info"),
            Self::NoPlayers => write!(f, "Server has no players"),
            Self::NoRules => write!(f, "Server has no rules"),
            Self::UnsupportedTitle(id) => write!(f, "Unsupported game title (id {})", id),
            Self::Truncated => write!(f, "Response ended before all fields were read"),
            Self::SplitResponse => write!(f, "Multi-packet responses are not supported"),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::HostConnection(e) | Self::DataTransmit(e) => Some(e),
            _ => None,
        }
    }
}
