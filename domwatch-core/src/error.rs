use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("WHOIS query to {server} failed: {reason}")]
    WhoisConnection { server: String, reason: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Empty WHOIS response from {0}")]
    EmptyResponse(String),

    #[error("WHOIS response from {0} exceeds size limit")]
    ResponseTooLarge(String),

    #[error("Unparseable WHOIS response: {0}")]
    UnparseableResponse(String),

    #[error("Domain not found in registry: {0}")]
    DomainNotFound(String),

    #[error("No plausible expiry date found in WHOIS response")]
    ExpiryNotFound,

    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    #[error("All WHOIS strategies failed for {domain}: {last_error}")]
    StrategiesExhausted {
        domain: String,
        last_error: String,
        transient: bool,
    },

    #[error("Operation failed after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: usize, last_error: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed configuration payload: {0}")]
    MalformedPayload(String),

    #[error("Configuration source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Configuration source returned no content")]
    SourceEmpty,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Whether the failure happened while talking to a server rather than
    /// while interpreting what it sent back.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WatchError::WhoisConnection { .. }
                | WatchError::Timeout(_)
                | WatchError::EmptyResponse(_)
                | WatchError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
