use crate::error::{CatalogError, Result};
use reqwest::Url;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0) like Gecko";
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Single serialization point for every call to the catalog API.
///
/// Calls are issued one at a time and spaced at least `min_interval` apart,
/// measured from the completion of the previous call. The pacing clock is
/// advanced after failed calls too.
pub struct ApiGateway {
    http: reqwest::Client,
    base_url: Url,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ApiGateway {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            min_interval: DEFAULT_MIN_INTERVAL,
            last_request: Mutex::new(None),
        })
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    #[tracing::instrument(level = "debug", skip(self, params))]
    pub async fn request(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        let url = self.endpoint_url(endpoint)?;

        // Held across the pacing sleep and the call itself.
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!(?wait, "pacing catalog request");
                tokio::time::sleep(wait).await;
            }
        }

        let outcome = self.send(url, params).await;
        *last_request = Some(Instant::now());

        if let Err(e) = &outcome {
            tracing::debug!(%e, "catalog request failed");
        }
        outcome
    }

    async fn send(&self, url: Url, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let resp = self.http.get(url).query(params).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(CatalogError::Upstream {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| CatalogError::InvalidInput(format!("endpoint {endpoint:?}: {e}")))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::InvalidInput(
            "api base url must not be empty".to_string(),
        ));
    }
    // `Url::join` drops the last path segment unless the base ends with '/'.
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&normalized)
        .map_err(|e| CatalogError::InvalidInput(format!("api base url {trimmed:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CatalogError::InvalidInput(format!(
            "api base url scheme must be http or https, got {other:?}"
        ))),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_INTERVAL: Duration = Duration::from_millis(300);

    fn gateway(server: &MockServer) -> ApiGateway {
        ApiGateway::new(&server.uri())
            .expect("gateway")
            .with_min_interval(TEST_INTERVAL)
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let gw = ApiGateway::new("https://music.example.com/api").expect("gateway");
        let url = gw.endpoint_url("/search").expect("endpoint url");
        assert_eq!(url.as_str(), "https://music.example.com/api/search");

        let url = gw
            .endpoint_url("song/download/url/v1")
            .expect("endpoint url");
        assert_eq!(
            url.as_str(),
            "https://music.example.com/api/song/download/url/v1"
        );
    }

    #[test]
    fn base_url_rejects_empty_and_non_http() {
        assert!(matches!(
            ApiGateway::new("  "),
            Err(CatalogError::InvalidInput(_))
        ));
        assert!(matches!(
            ApiGateway::new("ftp://music.example.com"),
            Err(CatalogError::InvalidInput(_))
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("下载音乐", 2), "下载...");
        assert_eq!(truncate_chars("abc", 5), "abc");
    }

    #[tokio::test]
    async fn returns_json_body_and_forwards_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("keywords", "Yesterday"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
            .mount(&server)
            .await;

        let body = gateway(&server)
            .request("search", &[("keywords", "Yesterday".to_string())])
            .await
            .expect("request ok");
        assert_eq!(body["code"], 200);
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .request("search", &[])
            .await
            .expect_err("should fail");
        match err {
            CatalogError::Upstream { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .request("search", &[])
            .await
            .expect_err("should fail");
        assert!(matches!(err, CatalogError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let gw = ApiGateway::new("http://127.0.0.1:9").expect("gateway");
        let err = gw.request("search", &[]).await.expect_err("should fail");
        assert!(err.is_upstream_unavailable());
        assert!(matches!(err, CatalogError::Transport(_)));
    }

    #[tokio::test]
    async fn back_to_back_calls_are_spaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        let gw = gateway(&server);

        gw.request("search", &[]).await.expect("first");
        let first_done = Instant::now();
        gw.request("search", &[]).await.expect("second");
        assert!(first_done.elapsed() >= TEST_INTERVAL);
    }

    #[tokio::test]
    async fn spacing_applies_after_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        let gw = gateway(&server);

        assert!(gw.request("search", &[]).await.is_err());
        let failed_at = Instant::now();
        gw.request("search", &[]).await.expect("second");
        assert!(failed_at.elapsed() >= TEST_INTERVAL);
    }

    #[tokio::test]
    async fn concurrent_callers_do_not_burst() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(3)
            .mount(&server)
            .await;
        let gw = Arc::new(gateway(&server));

        let started = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let gw = gw.clone();
            handles.push(tokio::spawn(
                async move { gw.request("search", &[]).await },
            ));
        }
        for handle in handles {
            handle.await.expect("join").expect("request ok");
        }
        assert!(started.elapsed() >= TEST_INTERVAL * 2);
    }
}
