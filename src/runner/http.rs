use reqwest::Url;
use tracing::debug;

use super::{ProbeError, TestContext};
use crate::types::{Socket, TestResult};

/// Expected set used when an HTTP socket lists no codes.
pub const DEFAULT_HTTP_CODES: &[u16] = &[200];

/// Build `scheme://host[:port]path` for a socket. `http://` is assumed when
/// the host has no scheme, and the port is only applied when non-zero and not
/// already part of the host. `http_path` is appended to any path the host
/// already carries; a `?query` in it replaces the host's query.
pub fn target_url(socket: &Socket) -> Result<Url, ProbeError> {
    let host = socket.host.trim();
    let base = if socket.has_http_scheme() {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    let invalid = |message: String| ProbeError::InvalidUrl {
        url: base.clone(),
        message,
    };
    let mut url = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
    if socket.port != 0 && url.port().is_none() {
        url.set_port(Some(socket.port))
            .map_err(|_| invalid("cannot carry a port".into()))?;
    }
    if !socket.http_path.is_empty() {
        let (path, query) = match socket.http_path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (socket.http_path.as_str(), None),
        };
        let base_path = url.path().trim_end_matches('/');
        let path = format!("{base_path}/{}", path.trim_start_matches('/'));
        url.set_path(&path);
        if query.is_some() {
            url.set_query(query);
        }
    }
    Ok(url)
}

/// Exact membership check of `code` against `expected`.
pub fn check_http_code(code: u16, expected: &[u16]) -> Result<(), ProbeError> {
    let expected = if expected.is_empty() {
        DEFAULT_HTTP_CODES
    } else {
        expected
    };
    if expected.contains(&code) {
        Ok(())
    } else {
        Err(ProbeError::UnexpectedStatus {
            expected: expected.to_vec(),
            got: code,
        })
    }
}

/// HEAD the socket's URL and compare the status against its expected codes.
pub async fn run_test(ctx: &TestContext, socket: Socket) -> TestResult {
    let url = match target_url(&socket) {
        Ok(u) => u,
        Err(e) => return TestResult::failed(socket, None, e),
    };
    let resp = match ctx.run(ctx.http().head(url.clone()).send()).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            let err = ProbeError::Http {
                url: url.to_string(),
                message: e.to_string(),
            };
            return TestResult::failed(socket, None, err);
        }
        Err(e) => return TestResult::failed(socket, None, e),
    };
    let code = resp.status().as_u16();
    debug!(%url, code, "http response");
    match check_http_code(code, &socket.http_codes) {
        Ok(()) => TestResult::passed(socket, Some(code)),
        Err(e) => TestResult::failed(socket, Some(code), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket(host: &str, port: u16, path: &str) -> Socket {
        Socket {
            id: "h".into(),
            host: host.into(),
            port,
            http_path: path.into(),
            ..Socket::default()
        }
    }

    #[test]
    fn code_in_set_passes() {
        assert!(check_http_code(200, &[200, 201]).is_ok());
        assert!(check_http_code(201, &[200, 201]).is_ok());
    }

    #[test]
    fn code_outside_set_names_both() {
        let err = check_http_code(404, &[200, 201]).unwrap_err();
        assert_eq!(err.to_string(), "expected codes: [200, 201], got 404");
    }

    #[test]
    fn empty_set_means_200() {
        assert!(check_http_code(200, &[]).is_ok());
        assert_eq!(
            check_http_code(204, &[]).unwrap_err().to_string(),
            "expected codes: [200], got 204"
        );
    }

    #[test]
    fn url_adds_scheme_port_and_path() {
        let u = target_url(&socket("example.com", 8080, "/health")).unwrap();
        assert_eq!(u.as_str(), "http://example.com:8080/health");
    }

    #[test]
    fn url_keeps_explicit_scheme_and_port() {
        let u = target_url(&socket("https://example.com:8443", 443, "/ping")).unwrap();
        assert_eq!(u.as_str(), "https://example.com:8443/ping");
        let u = target_url(&socket("https://example.com", 0, "")).unwrap();
        assert_eq!(u.as_str(), "https://example.com/");
    }

    #[test]
    fn path_appends_to_host_base_path() {
        let u = target_url(&socket("https://example.com/api", 0, "/health")).unwrap();
        assert_eq!(u.as_str(), "https://example.com/api/health");
        let u = target_url(&socket("https://example.com/api/", 0, "health")).unwrap();
        assert_eq!(u.as_str(), "https://example.com/api/health");
    }

    #[test]
    fn path_cannot_redirect_to_another_host() {
        let u = target_url(&socket("example.com", 80, "http://other.org/x")).unwrap();
        assert_eq!(u.host_str(), Some("example.com"));
    }

    #[test]
    fn path_query_is_kept() {
        let u = target_url(&socket("example.com", 0, "/status?verbose=1")).unwrap();
        assert_eq!(u.as_str(), "http://example.com/status?verbose=1");
    }

    #[test]
    fn bad_host_is_invalid_url() {
        assert!(matches!(
            target_url(&socket("http://exa mple.com", 0, "")),
            Err(ProbeError::InvalidUrl { .. })
        ));
    }
}
