use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scout_core::error::AppError;
use scout_core::traits::Fetcher;
use url::{Host, Url};

/// Desktop browser identity; several sites serve reduced markup to bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP fetcher using reqwest.
///
/// One GET per call, no retries. The timeout bounds the whole call: target
/// check, DNS, connect, headers and body. Targets that resolve to loopback,
/// private or link-local addresses are refused unless
/// [`allow_private_urls`](Self::allow_private_urls) is set.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout: Duration,
    public_only: bool,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout,
            public_only: true,
        })
    }

    /// Also fetch loopback and private-network targets (local sites, tests).
    pub fn allow_private_urls(mut self) -> Self {
        self.public_only = false;
        self
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }

    async fn get_body(&self, url: &str) -> Result<String, AppError> {
        if self.public_only {
            ensure_public_target(url).await?;
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_connect() || e.is_request() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::NetworkError(format!("Failed to read response body: {e}")))
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        tracing::debug!(%url, "GET");
        tokio::time::timeout(self.timeout, self.get_body(url))
            .await
            .map_err(|_| {
                tracing::debug!(%url, timeout = ?self.timeout, "Fetch deadline elapsed");
                AppError::Timeout(self.timeout_secs())
            })?
    }
}

/// Refuse anything but http(s) URLs whose host is, or resolves only to,
/// public addresses.
async fn ensure_public_target(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::BlockedUrl(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::BlockedUrl(format!(
            "{url}: only http and https are fetched"
        )));
    }

    let internal = match parsed.host() {
        None => return Err(AppError::BlockedUrl(format!("{url}: no host"))),
        Some(Host::Ipv4(ip)) => is_internal(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_internal(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let port = parsed.port_or_known_default().unwrap_or(80);
            let addrs: Vec<_> = tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| AppError::NetworkError(format!("DNS lookup for {domain} failed: {e}")))?
                .collect();
            if addrs.is_empty() {
                return Err(AppError::NetworkError(format!(
                    "DNS lookup for {domain} returned no addresses"
                )));
            }
            addrs.iter().any(|addr| is_internal(addr.ip()))
        }
    };

    if internal {
        tracing::warn!(%url, "Refusing internal target");
        return Err(AppError::BlockedUrl(format!(
            "{url} points at an internal address"
        )));
    }
    Ok(())
}

/// Loopback, private, link-local (cloud metadata), CGNAT, unspecified,
/// broadcast and documentation ranges. IPv4-mapped IPv6 is checked as IPv4.
fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || (a == 100 && (64..128).contains(&b))
        }
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal(IpAddr::V4(v4)),
            None => {
                let head = v6.segments()[0];
                v6.is_loopback()
                    || v6.is_unspecified()
                    || head & 0xffc0 == 0xfe80
                    || head & 0xfe00 == 0xfc00
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn classifies_internal_addresses() {
        let internal = [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "::1",
            "fe80::1",
            "fd00::1",
            "::ffff:169.254.169.254",
        ];
        let public = ["8.8.8.8", "93.184.216.34", "100.128.0.1", "2001:4860:4860::8888"];

        for ip in internal {
            assert!(is_internal(ip.parse().unwrap()), "{ip} should be internal");
        }
        for ip in public {
            assert!(!is_internal(ip.parse().unwrap()), "{ip} should be public");
        }
    }

    #[tokio::test]
    async fn public_ip_literal_passes_without_lookup() {
        assert!(ensure_public_target("https://93.184.216.34/").await.is_ok());
    }

    #[tokio::test]
    async fn refuses_internal_and_non_http_targets() {
        let fetcher = ReqwestFetcher::new().unwrap();
        for url in [
            "http://127.0.0.1:9/",
            "http://[::1]/",
            "http://169.254.169.254/latest/meta-data/",
            "file:///etc/passwd",
        ] {
            let err = fetcher.fetch(url).await.unwrap_err();
            assert!(matches!(err, AppError::BlockedUrl(_)), "{url}: {err}");
            assert!(err.is_fetch_error());
        }
    }

    #[tokio::test]
    async fn closed_port_is_a_fetch_error() {
        let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(2))
            .unwrap()
            .allow_private_urls();
        // Port 9 (discard) is closed on a typical host
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.is_fetch_error());
    }

    #[tokio::test]
    async fn stalled_server_hits_the_fetch_deadline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // Accept and never answer.
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let fetcher = ReqwestFetcher::with_timeout(Duration::from_millis(200))
            .unwrap()
            .allow_private_urls();
        let started = Instant::now();
        let err = fetcher.fetch(&format!("http://{addr}/")).await.unwrap_err();

        assert!(matches!(err, AppError::Timeout(_)), "got {err}");
        assert!(started.elapsed() < Duration::from_secs(2));
        server.abort();
    }

    #[test]
    fn default_timeout_is_ten_seconds() {
        let fetcher = ReqwestFetcher::new().unwrap();
        assert_eq!(fetcher.timeout_secs(), 10);
    }
}
