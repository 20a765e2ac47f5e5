use crate::error::{CatalogError, Result};
use crate::gateway::ApiGateway;
use crate::shapes::{extract_link, extract_tracks};
use crate::types::{LinkOptions, Track};
use async_trait::async_trait;

const SEARCH_ENDPOINT: &str = "search";
const DIRECT_LINK_ENDPOINT: &str = "song/download/url/v1";
const SEARCH_TYPE_SONG: &str = "1";

/// The two catalog lookups the interaction flow depends on.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Ordered search results; an empty vec means nothing matched.
    async fn search(&self, keyword: &str, limit: u32) -> Result<Vec<Track>>;

    /// Direct download link for a track. Failures degrade to `None`.
    async fn fetch_direct_link(&self, track_id: &str, options: &LinkOptions) -> Option<String>;
}

pub struct CatalogClient {
    gateway: ApiGateway,
    token: Option<String>,
}

impl CatalogClient {
    pub fn new(gateway: ApiGateway) -> Self {
        Self {
            gateway,
            token: None,
        }
    }

    /// Opaque API token appended to every request as `token=`.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    fn push_token(&self, params: &mut Vec<(&'static str, String)>) {
        if let Some(token) = &self.token {
            params.push(("token", token.clone()));
        }
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    #[tracing::instrument(level = "info", skip(self))]
    async fn search(&self, keyword: &str, limit: u32) -> Result<Vec<Track>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(CatalogError::InvalidInput(
                "search keyword must not be empty".to_string(),
            ));
        }
        let mut params = vec![
            ("keywords", keyword.to_string()),
            ("limit", limit.max(1).to_string()),
            ("type", SEARCH_TYPE_SONG.to_string()),
        ];
        self.push_token(&mut params);

        let body = self.gateway.request(SEARCH_ENDPOINT, &params).await?;
        let mut tracks = extract_tracks(&body);
        tracks.truncate(limit.max(1) as usize);
        tracing::info!(results = tracks.len(), "catalog search finished");
        Ok(tracks)
    }

    #[tracing::instrument(level = "info", skip(self, options))]
    async fn fetch_direct_link(&self, track_id: &str, options: &LinkOptions) -> Option<String> {
        let mut params = vec![("id", track_id.to_string())];
        if let Some(level) = &options.level {
            params.push(("level", level.clone()));
        }
        if let Some(cookie) = &options.cookie {
            params.push(("cookie", cookie.clone()));
        }
        self.push_token(&mut params);

        let body = match self.gateway.request(DIRECT_LINK_ENDPOINT, &params).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(%e, "direct link request failed");
                return None;
            }
        };
        let link = extract_link(&body);
        if link.is_none() {
            tracing::warn!("direct link response carried no usable link");
        }
        link
    }
}
