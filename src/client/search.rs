use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::selector::BackendSelector;
use super::{ImageSearch, SEARCH_PATH, build_http_client, post_json};
use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::models::{SearchRequest, SearchResponse};

/// Image search with per-URL retries and main/test failover.
///
/// Each candidate URL gets up to `retry_count + 1` attempts spaced by
/// `retry_delay`. A connection failure or timeout abandons the URL right
/// away, since repeating the attempt would only burn the delay.
#[derive(Debug, Clone)]
pub struct ImageSearchClient {
    http: reqwest::Client,
    selector: Arc<BackendSelector>,
    retry_count: u32,
    retry_delay: Duration,
}

impl ImageSearchClient {
    pub fn new(
        selector: Arc<BackendSelector>,
        timeout: Duration,
        retry_count: u32,
        retry_delay: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            selector,
            retry_count,
            retry_delay,
        })
    }

    pub fn from_config(config: &Config, selector: Arc<BackendSelector>) -> anyhow::Result<Self> {
        Self::new(
            selector,
            config.search_timeout,
            config.retry_count,
            config.retry_delay,
        )
    }

    /// Searches a 1-based `page` of `limit` images
    pub async fn search(&self, query: &str, page: u32, limit: u32) -> ClientResult<SearchResponse> {
        if page == 0 {
            return Err(ClientError::InvalidRequest(
                "page numbers start at 1".to_string(),
            ));
        }
        self.search_request(&SearchRequest::for_page(query, page, limit))
            .await
    }

    pub async fn search_request(&self, request: &SearchRequest) -> ClientResult<SearchResponse> {
        request.validate().map_err(ClientError::InvalidRequest)?;
        info!(
            "Image search for '{}' (limit={}, offset={})",
            request.query, request.limit, request.offset
        );

        let attempts = self.retry_count + 1;
        let mut failures = Vec::new();

        for backend in self.selector.candidates() {
            let url = format!("{}{}", backend.base_url, SEARCH_PATH);

            for attempt in 1..=attempts {
                debug!("Attempt {}/{} against {}", attempt, attempts, url);

                match post_json::<_, SearchResponse>(&self.http, &url, request).await {
                    Ok(response) => {
                        info!(
                            "Image search answered by {}: {} images of {}",
                            backend.name,
                            response.images.len(),
                            response.total_count
                        );
                        self.selector.mark_success(&backend.name);
                        return Ok(response);
                    }
                    Err(err) => {
                        warn!(
                            "Image search attempt {}/{} on {} failed: {}",
                            attempt, attempts, backend.name, err
                        );
                        let unreachable = err.is_unreachable();
                        failures.push(format!("{} attempt {}: {}", url, attempt, err));

                        if unreachable {
                            break;
                        }
                        if attempt < attempts {
                            sleep(self.retry_delay).await;
                        }
                    }
                }
            }

            self.selector.mark_failure(&backend.name);
        }

        error!("Image search exhausted all backends for '{}'", request.query);
        Err(ClientError::Exhausted(failures))
    }
}

#[async_trait]
impl ImageSearch for ImageSearchClient {
    async fn search_images(&self, request: &SearchRequest) -> ClientResult<SearchResponse> {
        self.search_request(request).await
    }
}
