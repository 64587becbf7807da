//! Protocol runners and their dispatch.
//!
//! Every socket maps to exactly one [`Runner`] through [`select_runner`]. Runners
//! hold no state; everything a test needs arrives through the [`TestContext`].
pub mod http;
pub mod icmp;
pub mod tcp;

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::types::{Socket, TestResult};

pub use icmp::IcmpError;

/// Why a single socket test failed. Carried as data inside a [`TestResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("socket has no host")]
    MissingHost,
    #[error("dial tcp {addr}: {message}")]
    Dial { addr: String, message: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
    #[error("invalid url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("HEAD {url}: {message}")]
    Http { url: String, message: String },
    #[error("expected codes: {expected:?}, got {got}")]
    UnexpectedStatus { expected: Vec<u16>, got: u16 },
    #[error(transparent)]
    Icmp(#[from] IcmpError),
    #[error("test aborted: {0}")]
    Aborted(String),
}

/// Deadline, cancellation and shared HTTP client for one test.
#[derive(Debug, Clone)]
pub struct TestContext {
    cancel: CancellationToken,
    timeout: Duration,
    deadline: Instant,
    http: reqwest::Client,
}

impl TestContext {
    /// Context whose deadline is `timeout` from now.
    pub fn new(cancel: CancellationToken, timeout: Duration, http: reqwest::Client) -> Self {
        Self {
            cancel,
            timeout,
            deadline: Instant::now() + timeout,
            http,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Drive `fut` until it finishes, the deadline passes or the run is cancelled.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ProbeError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            res = time::timeout_at(self.deadline, fut) => {
                res.map_err(|_| ProbeError::Timeout(self.timeout))
            }
        }
    }
}

/// Closed set of protocol tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Runner {
    Tcp,
    Http,
    Icmp,
}

/// Pick the runner for a socket.
///
/// HTTP wins when the host carries an http(s) scheme or any HTTP field is set.
/// Otherwise port 0 means ICMP and anything else is a plain TCP connect.
pub fn select_runner(socket: &Socket) -> Runner {
    if socket.has_http_scheme() || !socket.http_path.is_empty() || !socket.http_codes.is_empty()
    {
        Runner::Http
    } else if socket.port == 0 {
        Runner::Icmp
    } else {
        Runner::Tcp
    }
}

impl Runner {
    pub fn as_str(self) -> &'static str {
        match self {
            Runner::Tcp => "tcp",
            Runner::Http => "http",
            Runner::Icmp => "icmp",
        }
    }

    /// Execute this runner's test. Never panics on network failure; every
    /// outcome comes back as a [`TestResult`].
    pub async fn run_test(self, ctx: &TestContext, socket: Socket) -> TestResult {
        if socket.host.trim().is_empty() {
            return TestResult::failed(socket, None, ProbeError::MissingHost);
        }
        match self {
            Runner::Tcp => tcp::run_test(ctx, socket).await,
            Runner::Http => http::run_test(ctx, socket).await,
            Runner::Icmp => icmp::run_test(ctx, socket).await,
        }
    }
}

/// Strip IPv6 literal brackets so the host can be fed to resolvers.
pub(crate) fn bare_host(host: &str) -> &str {
    let host = host.trim();
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket(host: &str, port: u16) -> Socket {
        Socket {
            id: "s".into(),
            host: host.into(),
            port,
            ..Socket::default()
        }
    }

    #[test]
    fn scheme_selects_http() {
        assert_eq!(select_runner(&socket("https://example.com", 0)), Runner::Http);
        assert_eq!(select_runner(&socket("http://example.com", 8080)), Runner::Http);
    }

    #[test]
    fn http_fields_select_http_without_scheme() {
        let mut s = socket("example.com", 80);
        s.http_path = "/health".into();
        assert_eq!(select_runner(&s), Runner::Http);

        let mut s = socket("example.com", 0);
        s.http_codes = vec![204];
        assert_eq!(select_runner(&s), Runner::Http);
    }

    #[test]
    fn zero_port_selects_icmp_and_port_selects_tcp() {
        assert_eq!(select_runner(&socket("10.0.0.1", 0)), Runner::Icmp);
        assert_eq!(select_runner(&socket("10.0.0.1", 22)), Runner::Tcp);
    }

    #[test]
    fn bare_host_strips_brackets() {
        assert_eq!(bare_host("[::1]"), "::1");
        assert_eq!(bare_host(" example.com "), "example.com");
    }

    #[tokio::test]
    async fn empty_host_fails_without_network() {
        let ctx = TestContext::new(
            CancellationToken::new(),
            Duration::from_secs(1),
            reqwest::Client::new(),
        );
        let r = Runner::Tcp.run_test(&ctx, socket("", 22)).await;
        assert!(!r.pass);
        assert_eq!(r.error, Some(ProbeError::MissingHost));
    }

    #[tokio::test]
    async fn cancelled_context_aborts_pending_work() {
        let cancel = CancellationToken::new();
        let ctx = TestContext::new(cancel.clone(), Duration::from_secs(30), reqwest::Client::new());
        cancel.cancel();
        let res = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(res, Err(ProbeError::Cancelled));
    }

    #[tokio::test]
    async fn deadline_bounds_pending_work() {
        let ctx = TestContext::new(
            CancellationToken::new(),
            Duration::from_millis(20),
            reqwest::Client::new(),
        );
        let res = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(res, Err(ProbeError::Timeout(Duration::from_millis(20))));
    }
}
