use super::TransportError;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// System HTTP proxy discovered from the environment, if any.
fn discover() -> Option<String> {
    ["http_proxy", "HTTP_PROXY", "https_proxy", "HTTPS_PROXY"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
}

/// Build a client for `remote_url`, routing through the discovered system
/// proxy when it validates.
///
/// Validation policy, kept exactly as the historical behavior: a throwaway
/// GET is issued through the proxy and its body discarded. If that probe
/// fails to even reach a host, the proxy is considered unusable and the
/// client falls back to a direct connection. Any other probe failure is
/// logged as a warning and the proxy is still used for real requests.
pub async fn client_for(timeout: Duration, remote_url: &str) -> Result<Client, TransportError> {
    let direct = || {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))
    };

    let Some(proxy_url) = discover() else {
        return direct();
    };

    let proxy = match reqwest::Proxy::all(&proxy_url) {
        Ok(p) => p,
        Err(e) => {
            warn!("ignoring malformed proxy {proxy_url}: {e}");
            return direct();
        }
    };

    let proxied = Client::builder()
        .timeout(timeout)
        .proxy(proxy)
        .build()
        .map_err(|e| TransportError::Connection(e.to_string()))?;

    match proxied.get(remote_url).send().await {
        Ok(resp) => {
            let _ = resp.bytes().await;
            debug!("proxy {proxy_url} validated for {remote_url}");
            Ok(proxied)
        }
        Err(e) if e.is_connect() => {
            warn!("proxy {proxy_url} cannot reach {remote_url}, falling back to direct");
            direct()
        }
        Err(e) => {
            warn!("proxy probe for {proxy_url} failed ({e}), keeping proxy anyway");
            Ok(proxied)
        }
    }
}
