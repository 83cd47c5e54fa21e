use super::DiscoveryClient;
use crate::core::{ObjectError, Result};
use reqwest::{StatusCode, Url};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_PORT: u16 = 8500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Key-value reads over HTTP, in the style of Consul's KV endpoint:
/// `GET <endpoint>/v1/kv/<key>?raw` returns the stored bytes, 404 when the
/// key is absent.
///
/// Hosts are tried in order; a host that fails or answers with anything but
/// 200/404 hands over to the next one.
pub struct HttpKvDiscovery {
    client: Client,
    endpoints: Vec<Url>,
}

impl HttpKvDiscovery {
    pub fn connect(hosts: &[String]) -> Result<Self> {
        let endpoints = hosts
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(endpoint)
            .collect::<Result<Vec<Url>>>()?;

        if endpoints.is_empty() {
            return Err(ObjectError::ConfigInvalid(
                "no discovery hosts configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| ObjectError::StorageError(format!("discovery client: {}", e)))?;

        debug!(endpoints = ?endpoints.iter().map(Url::as_str).collect::<Vec<_>>(), "discovery client ready");
        Ok(Self { client, endpoints })
    }

    /// Split a comma separated host list such as `"zk1:8500,zk2"`.
    pub fn parse_hosts(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }
}

impl DiscoveryClient for HttpKvDiscovery {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut last_error = String::new();

        for endpoint in &self.endpoints {
            let url = kv_url(endpoint, key)?;

            match self.client.get(url.clone()).send() {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => return Ok(None),
                Ok(resp) if resp.status().is_success() => {
                    let body = resp
                        .bytes()
                        .map_err(|e| ObjectError::StorageError(format!("{}: {}", url, e)))?;
                    return Ok(Some(body.to_vec()));
                }
                Ok(resp) => {
                    warn!(%endpoint, status = %resp.status(), "discovery host refused read");
                    last_error = format!("{} answered {}", endpoint, resp.status());
                }
                Err(err) => {
                    warn!(%endpoint, error = %err, "discovery host unreachable");
                    last_error = format!("{}: {}", endpoint, err);
                }
            }
        }

        Err(ObjectError::StorageError(format!(
            "no discovery host answered for '{}' ({})",
            key, last_error
        )))
    }

    fn backend_name(&self) -> &'static str {
        "http-kv"
    }
}

/// Base URL of one host. `http://` and port 8500 are assumed when absent;
/// a path after the host is kept as a prefix of the KV route.
fn endpoint(host: &str) -> Result<Url> {
    let invalid = |reason: &str| {
        ObjectError::ConfigInvalid(format!("invalid discovery host '{}': {}", host, reason))
    };

    let (with_scheme, rest) = match host.split_once("://") {
        Some((_, rest)) => (host.to_string(), rest),
        None => (format!("http://{}", host), host),
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;
    if url.cannot_be_a_base() || url.host().is_none() {
        return Err(invalid("no host"));
    }

    // `Url::port` hides a port equal to the scheme default, so look at the text
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or_default();
    let has_port = authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.contains(']'));
    if !has_port {
        url.set_port(Some(DEFAULT_PORT))
            .map_err(|_| invalid("cannot carry a port"))?;
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// `<endpoint>/v1/kv/<key>?raw`, each key segment percent-encoded.
fn kv_url(endpoint: &Url, key: &str) -> Result<Url> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| ObjectError::ConfigInvalid(format!("'{}' cannot take a path", endpoint)))?
        .pop_if_empty()
        .extend(["v1", "kv"])
        .extend(key.split('/').filter(|segment| !segment.is_empty()));
    url.set_query(Some("raw"));
    Ok(url)
}
