//! Turns a source identifier (file path or `http(s)://` URL) into raw socket-list bytes.
use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::cache::{self, CacheStore};
use crate::config::{CacheConfig, Config, Header};

/// Returns the parsed URL when `source` is a well-formed http(s) URL with a host.
pub fn remote_url(source: &str) -> Option<Url> {
    let url = Url::parse(source).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

/// Resolve `config.source` using a client bounded by `config.timeout`.
pub async fn fetch_source(config: &Config) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .context("failed to build HTTP client")?;
    resolve(&config.source, config.header.as_ref(), &config.cache, &client).await
}

/// Resolve a source into bytes.
///
/// Local paths are read directly and any failure is returned. Remote sources
/// get one GET; on transport error or non-2xx status the cache entry for the
/// URL is served if it is younger than the TTL, otherwise the fetch error is
/// returned together with the cache miss. A successful fetch is written to the
/// cache when caching is enabled.
pub async fn resolve(
    source: &str,
    header: Option<&Header>,
    cache_cfg: &CacheConfig,
    client: &reqwest::Client,
) -> Result<Vec<u8>> {
    let Some(url) = remote_url(source) else {
        info!(path = source, "reading socket list from file");
        return tokio::fs::read(source)
            .await
            .with_context(|| format!("failed to read socket list: {source}"));
    };

    info!(%url, "fetching socket list");
    let fetch_err = match fetch(client, url.clone(), header).await {
        Ok(bytes) => {
            if cache_cfg.enabled {
                let store = CacheStore::new(&cache_cfg.dir);
                let key = cache::key_for(source);
                match store.put(&key, &bytes) {
                    Ok(()) => debug!(%key, dir = %store.dir().display(), "cached socket list"),
                    Err(e) => warn!("failed to cache socket list: {e}"),
                }
            }
            return Ok(bytes);
        }
        Err(e) => e,
    };

    if !cache_cfg.enabled {
        return Err(fetch_err.context(format!("failed to fetch socket list from {url}")));
    }

    warn!("fetch from {url} failed ({fetch_err:#}), trying cache");
    let store = CacheStore::new(&cache_cfg.dir);
    match store.get(&cache::key_for(source), cache_cfg.ttl) {
        Ok(bytes) => {
            info!(%url, "using cached socket list");
            Ok(bytes)
        }
        Err(cache_err) => Err(anyhow!(cache_err).context(format!(
            "failed to fetch socket list from {url} ({fetch_err:#}) and no usable cache entry"
        ))),
    }
}

async fn fetch(client: &reqwest::Client, url: Url, header: Option<&Header>) -> Result<Vec<u8>> {
    let mut req = client.get(url);
    if let Some(h) = header {
        req = req.header(h.name.as_str(), h.value.as_str());
    }
    let resp = req.send().await?.error_for_status()?;
    let bytes = resp.bytes().await?;
    Ok(bytes.to_vec())
}
