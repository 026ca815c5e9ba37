//! HTTP clients for the ex-GPT backends.
//!
//! The search and chat clients sit behind the [`ImageSearch`] and
//! [`ChatService`] traits so the facade can be driven by fakes in tests.

pub mod chat;
pub mod health;
pub mod search;
pub mod selector;

pub use chat::ChatClient;
pub use health::{HealthEndpoint, HealthProbe};
pub use search::ImageSearchClient;
pub use selector::{Backend, BackendSelector};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::models::{ChatRequest, ChatResponse, SearchRequest, SearchResponse};

pub const SEARCH_PATH: &str = "/api/v1/search/images";
pub const MULTIMODAL_CHAT_PATH: &str = "/api/v1/chat/multimodal";
pub const HISTORY_CHAT_PATH: &str = "/api/v1/chat";

#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn search_images(&self, request: &SearchRequest) -> ClientResult<SearchResponse>;
}

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send_chat(&self, request: &ChatRequest) -> ClientResult<ChatResponse>;
}

pub(crate) fn build_http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// POSTs a JSON body and decodes a JSON reply, mapping non-2xx statuses to
/// [`ClientError::Http`].
pub(crate) async fn post_json<B, R>(client: &reqwest::Client, url: &str, body: &B) -> ClientResult<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    debug!("Received response status {} from {}", status, url);

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    debug!("Response body: {}", body);

    Ok(serde_json::from_str(&body)?)
}
