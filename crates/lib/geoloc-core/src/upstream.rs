//! Shared HTTP plumbing for the external geodata and encyclopedic services.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

/// User agent sent to every upstream service.
pub const USER_AGENT: &str = concat!("geoloc-mcp/", env!("CARGO_PKG_VERSION"));

/// Connection-level failure classes, kept apart so operators can tell a
/// connectivity problem from a server-side one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailureKind {
    Dns,
    ConnectionRefused,
    ConnectionReset,
    ConnectTimeout,
    Other,
}

impl NetworkFailureKind {
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Dns => "DNS lookup failed, check network connectivity",
            Self::ConnectionRefused => "connection refused by remote host",
            Self::ConnectionReset => "connection reset by remote host",
            Self::ConnectTimeout => "connection attempt timed out",
            Self::Other => "network error",
        }
    }

    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Dns | Self::ConnectionReset | Self::ConnectTimeout)
    }
}

/// Failure talking to an upstream HTTP service.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("{service} request timed out after {timeout_secs}s")]
    Timeout {
        service: &'static str,
        timeout_secs: u64,
    },
    #[error("{service} is temporarily unavailable (status {status}), try again later")]
    Unavailable { service: &'static str, status: u16 },
    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("{service} unreachable: {} ({message})", .kind.describe())]
    Network {
        service: &'static str,
        kind: NetworkFailureKind,
        message: String,
    },
    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
    #[error("failed to build {service} HTTP client: {message}")]
    Client {
        service: &'static str,
        message: String,
    },
    #[error("{service} failed after {attempts} attempts: {last}")]
    Exhausted {
        service: &'static str,
        attempts: u32,
        #[source]
        last: Box<UpstreamError>,
    },
}

impl UpstreamError {
    /// Maps a non-success status to the matching variant.
    #[must_use]
    pub const fn from_status(service: &'static str, status: u16) -> Self {
        match status {
            429 | 502 | 503 | 504 => Self::Unavailable { service, status },
            _ => Self::Status { service, status },
        }
    }

    /// Classifies a reqwest failure.
    #[must_use]
    pub fn from_reqwest(service: &'static str, err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                service,
                timeout_secs: timeout.as_secs(),
            };
        }
        if let Some(status) = err.status() {
            return Self::from_status(service, status.as_u16());
        }
        if err.is_decode() {
            return Self::Decode {
                service,
                message: err.to_string(),
            };
        }
        Self::Network {
            service,
            kind: classify_network_failure(err),
            message: err.to_string(),
        }
    }

    /// Whether another attempt may succeed: server errors, rate limiting,
    /// timeouts, and transient network failures.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unavailable { .. } => true,
            Self::Status { status, .. } => *status >= 500 && *status <= 599,
            Self::Network { kind, .. } => kind.is_transient(),
            Self::Decode { .. } | Self::Client { .. } | Self::Exhausted { .. } => false,
        }
    }
}

/// Walks the error source chain looking for the underlying network cause.
#[must_use]
pub fn classify_network_failure(err: &(dyn StdError + 'static)) -> NetworkFailureKind {
    let mut current = Some(err);
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return NetworkFailureKind::ConnectionRefused,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => return NetworkFailureKind::ConnectionReset,
                io::ErrorKind::TimedOut => return NetworkFailureKind::ConnectTimeout,
                _ => {}
            }
        }
        let text = cause.to_string().to_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
        {
            return NetworkFailureKind::Dns;
        }
        current = cause.source();
    }
    NetworkFailureKind::Other
}

/// Builds a client with the shared user agent and a hard request timeout.
///
/// # Errors
/// Returns `UpstreamError::Client` if the TLS backend cannot be initialised.
pub fn build_client(service: &'static str, timeout: Duration) -> Result<Client, UpstreamError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(|err| UpstreamError::Client {
            service,
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("error sending request")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn status_mapping_separates_unavailable_from_other_failures() {
        assert!(matches!(
            UpstreamError::from_status("overpass", 429),
            UpstreamError::Unavailable { status: 429, .. }
        ));
        assert!(matches!(
            UpstreamError::from_status("overpass", 504),
            UpstreamError::Unavailable { status: 504, .. }
        ));
        assert!(matches!(
            UpstreamError::from_status("overpass", 400),
            UpstreamError::Status { status: 400, .. }
        ));
    }

    #[test]
    fn retryable_covers_server_errors_but_not_client_errors() {
        assert!(UpstreamError::from_status("wikidata", 500).is_retryable());
        assert!(UpstreamError::from_status("wikidata", 503).is_retryable());
        assert!(UpstreamError::from_status("wikidata", 429).is_retryable());
        assert!(!UpstreamError::from_status("wikidata", 404).is_retryable());
        assert!(
            UpstreamError::Timeout {
                service: "wikidata",
                timeout_secs: 15
            }
            .is_retryable()
        );
    }

    #[test]
    fn classifies_io_causes_in_source_chain() {
        let reset = Wrapper(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(classify_network_failure(&reset), NetworkFailureKind::ConnectionReset);

        let refused = Wrapper(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(
            classify_network_failure(&refused),
            NetworkFailureKind::ConnectionRefused
        );

        let dns = Wrapper(io::Error::other("dns error: failed to lookup address information"));
        assert_eq!(classify_network_failure(&dns), NetworkFailureKind::Dns);
    }

    #[test]
    fn network_errors_read_as_operator_hints() {
        let err = UpstreamError::Network {
            service: "wikidata",
            kind: NetworkFailureKind::Dns,
            message: "dns error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "wikidata unreachable: DNS lookup failed, check network connectivity (dns error)"
        );
    }
}
