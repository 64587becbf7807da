use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::types::{Socket, SocketList};

/// Decode a socket-list document into target descriptors.
///
/// Unknown fields are ignored and missing fields take their defaults. No
/// semantic validation happens here: a socket without an id or host is passed
/// through and fails when it is tested.
pub fn decode(bytes: &[u8]) -> Result<Vec<Socket>> {
    let list: SocketList =
        serde_json::from_slice(bytes).context("malformed socket list payload")?;
    Ok(list.sockets)
}

/// Convenience wrapper over [`decode`] for string input.
pub fn parse_sockets_str(s: &str) -> Result<Vec<Socket>> {
    decode(s.as_bytes())
}

/// Load and decode a socket list from a local file.
pub fn load_sockets_from_path(path: impl AsRef<Path>) -> Result<Vec<Socket>> {
    let content = fs::read(path.as_ref())
        .with_context(|| format!("failed to read socket list: {}", path.as_ref().display()))?;
    decode(&content)
}
