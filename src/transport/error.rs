use std::error::Error as StdError;
use std::io;
use thiserror::Error;
use url::Url;

/// What went wrong on the wire
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportErrorKind {
    #[error("request timed out")]
    Timeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("DNS resolution failed")]
    DnsFailure,

    #[error("HTTP {0}")]
    HttpError(u16),

    #[error("{0}")]
    Other(String),
}

/// A failed fetch, tagged with the URL it was for
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({url})")]
pub struct TransportError {
    pub url: String,
    pub kind: TransportErrorKind,
}

impl TransportError {
    pub fn new(url: &Url, kind: TransportErrorKind) -> Self {
        Self {
            url: url.to_string(),
            kind,
        }
    }

    pub fn from_reqwest(url: &Url, err: &reqwest::Error) -> Self {
        Self::new(url, classify_reqwest_error(err))
    }

    /// Non-2xx statuses are answers, not connectivity trouble
    pub fn is_http_status(&self) -> bool {
        matches!(self.kind, TransportErrorKind::HttpError(_))
    }
}

/// Maps a reqwest error onto a coarse failure kind
///
/// reqwest hides most of the detail behind its source chain, so the chain is
/// walked looking for an `io::Error` or a resolver message.
pub fn classify_reqwest_error(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    if let Some(status) = err.status() {
        return TransportErrorKind::HttpError(status.as_u16());
    }

    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return TransportErrorKind::ConnectionRefused,
                io::ErrorKind::TimedOut => return TransportErrorKind::Timeout,
                _ => {}
            }
        }

        let message = cause.to_string().to_ascii_lowercase();
        if message.contains("dns error")
            || message.contains("failed to lookup address")
            || message.contains("name or service not known")
            || message.contains("no such host")
        {
            return TransportErrorKind::DnsFailure;
        }
        if message.contains("connection refused") {
            return TransportErrorKind::ConnectionRefused;
        }

        source = cause.source();
    }

    TransportErrorKind::Other(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_url() {
        let url = Url::parse("https://example.com/a.pdf").unwrap();
        let err = TransportError::new(&url, TransportErrorKind::HttpError(404));
        assert_eq!(err.to_string(), "HTTP 404 (https://example.com/a.pdf)");
        assert!(err.is_http_status());
    }

    #[test]
    fn test_timeout_is_not_status() {
        let url = Url::parse("https://example.com/").unwrap();
        let err = TransportError::new(&url, TransportErrorKind::Timeout);
        assert!(!err.is_http_status());
    }

    #[tokio::test]
    async fn test_classify_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let err = client.get(url).send().await.unwrap_err();
        assert_eq!(
            classify_reqwest_error(&err),
            TransportErrorKind::ConnectionRefused
        );
    }
}
