use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unsupported auth type: {0}")]
    AuthResolution(String),

    #[error(transparent)]
    OAuth2(#[from] OAuth2Error),

    #[error("failed to create request: {0}")]
    RequestConstruction(String),

    #[error("request failed ({kind}): {source}")]
    Network {
        kind: ErrorKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("received error status code {0}")]
    HttpStatus(u16),

    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ProbeError {
    pub fn network(source: reqwest::Error) -> Self {
        ProbeError::Network {
            kind: ErrorKind::from_reqwest_error(&source),
            source,
        }
    }

    /// Failure class used for the run's error breakdown.
    pub fn class(&self) -> &'static str {
        match self {
            ProbeError::AuthResolution(_) => "auth",
            ProbeError::OAuth2(_) => "oauth2",
            ProbeError::RequestConstruction(_) => "request",
            ProbeError::Network { kind, .. } => kind.as_str(),
            ProbeError::HttpStatus(_) => "status",
            ProbeError::Client(_) => "client",
        }
    }
}

#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("OAuth request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("OAuth server returned status: {0}")]
    Status(u16),

    #[error("failed to read OAuth response: {0}")]
    Read(#[source] reqwest::Error),

    #[error("failed to parse OAuth response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("access_token not found in response")]
    MissingToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Dns,
    Connect,
    Tls,
    Refused,
    Reset,
    Http,
    Body,
    Other,
}

impl ErrorKind {
    pub fn from_reqwest_error(err: &reqwest::Error) -> Self {
        let text = format!("{:?}", err).to_lowercase();
        if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            if text.contains("dns") || text.contains("resolve") {
                ErrorKind::Dns
            } else if text.contains("refused") {
                ErrorKind::Refused
            } else if text.contains("reset") {
                ErrorKind::Reset
            } else {
                ErrorKind::Connect
            }
        } else if err.is_request() {
            ErrorKind::Http
        } else if err.is_body() {
            ErrorKind::Body
        } else if text.contains("tls") || text.contains("certificate") {
            ErrorKind::Tls
        } else {
            ErrorKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Dns => "dns",
            ErrorKind::Connect => "connect",
            ErrorKind::Tls => "tls",
            ErrorKind::Refused => "refused",
            ErrorKind::Reset => "reset",
            ErrorKind::Http => "http",
            ErrorKind::Body => "body",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
