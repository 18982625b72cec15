//! HTTP health probe.
//!
//! Services answer `GET <path>` on the loopback interface; any 2xx status
//! counts as healthy.

use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;
use url::Url;

/// Errors raised while probing a health endpoint.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe URL could not be parsed.
    #[error("invalid health url '{url}': {source}")]
    InvalidUrl {
        /// Rejected URL.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// Only plain `http` endpoints are probed.
    #[error("unsupported health url scheme '{scheme}'")]
    UnsupportedScheme {
        /// Rejected scheme.
        scheme: String,
    },
    /// The HTTP client could not be built.
    #[error("failed to build health client: {source}")]
    Client {
        /// Client builder error.
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint did not accept a connection.
    #[error("connection to {url} failed: {source}")]
    Connect {
        /// URL that was requested.
        url: String,
        /// Transport error.
        #[source]
        source: reqwest::Error,
    },
    /// No response arrived within the timeout.
    #[error("health request to {url} timed out")]
    Timeout {
        /// URL that was requested.
        url: String,
    },
    /// The exchange failed after connecting.
    #[error("health request to {url} failed: {source}")]
    Request {
        /// URL that was requested.
        url: String,
        /// Transport or protocol error.
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint answered with a non-success status.
    #[error("health endpoint returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
}

impl ProbeError {
    fn from_transport(url: &str, source: reqwest::Error) -> Self {
        let url = url.to_owned();
        if source.is_timeout() {
            Self::Timeout { url }
        } else if source.is_connect() {
            Self::Connect { url, source }
        } else {
            Self::Request { url, source }
        }
    }
}

/// Issues `GET` against `url` and succeeds on any 2xx status.
///
/// `timeout` bounds the whole exchange. Proxy settings from the environment
/// are ignored because the endpoints live on the loopback interface.
///
/// # Errors
///
/// Returns a [`ProbeError`] describing why the endpoint is not healthy.
pub fn check(url: &str, timeout: Duration) -> Result<(), ProbeError> {
    let parsed = Url::parse(url).map_err(|source| ProbeError::InvalidUrl {
        url: url.to_owned(),
        source,
    })?;
    if parsed.scheme() != "http" {
        return Err(ProbeError::UnsupportedScheme {
            scheme: parsed.scheme().to_owned(),
        });
    }

    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .no_proxy()
        .user_agent(concat!("conductor/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| ProbeError::Client { source })?;
    let response = client
        .get(parsed)
        .send()
        .map_err(|source| ProbeError::from_transport(url, source))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ProbeError::Status {
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read, Write};
    use std::net::{Shutdown, TcpListener};
    use std::thread;

    use rstest::rstest;

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// Serves one canned response and returns the request line it received.
    fn serve_once(response: &'static str) -> (u16, thread::JoinHandle<String>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buffer = [0_u8; 1024];
            let read = stream.read(&mut buffer).expect("read request");
            stream.write_all(response.as_bytes()).expect("write response");
            String::from_utf8_lossy(&buffer[..read])
                .lines()
                .next()
                .unwrap_or_default()
                .to_owned()
        });
        (port, handle)
    }

    #[test]
    fn success_status_passes_and_requests_path() {
        let (port, server) = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        check(&format!("http://127.0.0.1:{port}/api/health?full=1"), TIMEOUT)
            .expect("healthy endpoint");
        assert_eq!(
            server.join().expect("server thread"),
            "GET /api/health?full=1 HTTP/1.1"
        );
    }

    #[test]
    fn answer_sent_after_the_first_bytes_of_the_request_counts() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut prefix = [0_u8; 8];
            stream.read_exact(&mut prefix).expect("read request prefix");
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .expect("write response");
            stream.shutdown(Shutdown::Write).expect("shutdown write half");
            stream
                .set_read_timeout(Some(TIMEOUT))
                .expect("set read timeout");
            let _ = io::copy(&mut stream, &mut io::sink());
        });

        check(&format!("http://127.0.0.1:{port}/health"), TIMEOUT).expect("healthy endpoint");
        server.join().expect("server thread");
    }

    #[test]
    fn error_status_is_reported() {
        let (port, server) =
            serve_once("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n");
        let result = check(&format!("http://127.0.0.1:{port}/health"), TIMEOUT);
        server.join().expect("server thread");
        assert!(matches!(result, Err(ProbeError::Status { status: 503 })));
    }

    #[test]
    fn garbage_response_is_a_request_failure() {
        let (port, server) = serve_once("hello there\r\n\r\n");
        let result = check(&format!("http://127.0.0.1:{port}/health"), TIMEOUT);
        server.join().expect("server thread");
        assert!(
            matches!(result, Err(ProbeError::Request { .. })),
            "unexpected result {result:?}"
        );
    }

    #[test]
    fn closed_port_fails_to_connect() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        let result = check(&format!("http://127.0.0.1:{port}/health"), TIMEOUT);
        let error = result.expect_err("nothing listens on the port");
        assert!(matches!(error, ProbeError::Connect { .. }), "{error:?}");
        assert!(error.to_string().starts_with("connection to"));
    }

    #[test]
    fn silent_endpoint_times_out() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            thread::sleep(Duration::from_millis(600));
            drop(stream);
        });
        let result = check(
            &format!("http://127.0.0.1:{port}/health"),
            Duration::from_millis(200),
        );
        server.join().expect("server thread");
        assert!(
            matches!(result, Err(ProbeError::Timeout { .. })),
            "unexpected result {result:?}"
        );
    }

    #[rstest]
    #[case::not_a_url("not a url")]
    #[case::https("https://127.0.0.1:1/health")]
    fn unusable_urls_are_rejected(#[case] url: &str) {
        let result = check(url, TIMEOUT);
        assert!(
            matches!(
                result,
                Err(ProbeError::InvalidUrl { .. } | ProbeError::UnsupportedScheme { .. })
            ),
            "unexpected result {result:?}"
        );
    }
}
