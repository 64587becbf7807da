use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::runner::ProbeError;

/// One declared target to be health-checked.
///
/// Wire names (`socket_name`, `host_name`, `port_tcp`, `path_http`,
/// `expected_http_code_array`) are shared with existing list producers; the
/// short field names are accepted as aliases.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Socket {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "socket_name", alias = "name")]
    pub name: String,
    #[serde(default, rename = "host_name", alias = "host")]
    pub host: String,
    #[serde(default, rename = "port_tcp", alias = "port")]
    pub port: u16,
    #[serde(default, rename = "expected_http_code_array", alias = "http_codes")]
    pub http_codes: Vec<u16>,
    #[serde(default, rename = "path_http", alias = "http_path")]
    pub http_path: String,
}

impl Socket {
    /// `name` when set, otherwise the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn has_http_scheme(&self) -> bool {
        self.host.starts_with("http://") || self.host.starts_with("https://")
    }
}

/// Top-level wire document: `{"sockets": [...]}`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SocketList {
    #[serde(default)]
    pub sockets: Vec<Socket>,
}

/// Outcome of exactly one test against one socket.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub socket: Socket,
    pub pass: bool,
    pub response_code: Option<u16>,
    pub error: Option<ProbeError>,
}

impl TestResult {
    pub fn passed(socket: Socket, response_code: Option<u16>) -> Self {
        Self {
            socket,
            pass: true,
            response_code,
            error: None,
        }
    }

    pub fn failed(socket: Socket, response_code: Option<u16>, error: ProbeError) -> Self {
        Self {
            socket,
            pass: false,
            response_code,
            error: Some(error),
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.pass { "OK" } else { "FAIL" };
        write!(f, "[{status}] {} ({})", self.socket.display_name(), self.socket.id)?;
        if let Some(code) = self.response_code {
            write!(f, " code={code}")?;
        }
        if let Some(err) = &self.error {
            write!(f, ": {err}")?;
        }
        Ok(())
    }
}

/// Socket ID -> pass flag. Duplicate IDs keep the last value written.
pub type ResultSet = HashMap<String, bool>;
