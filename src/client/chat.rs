use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use super::selector::BackendSelector;
use super::{ChatService, HISTORY_CHAT_PATH, MULTIMODAL_CHAT_PATH, build_http_client, post_json};
use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::models::{ChatMessage, ChatOptions, ChatRequest, ChatResponse, HistoryChatRequest};

/// Chat client speaking both backend contracts.
///
/// The multimodal endpoint is tried first; if it fails in any way the
/// history-shaped endpoint gets one attempt with the same conversation.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    selector: Arc<BackendSelector>,
}

impl ChatClient {
    pub fn new(selector: Arc<BackendSelector>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            selector,
        })
    }

    pub fn from_config(config: &Config, selector: Arc<BackendSelector>) -> anyhow::Result<Self> {
        Self::new(selector, config.chat_timeout)
    }

    pub async fn send_message(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> ClientResult<ChatResponse> {
        self.send_request(&ChatRequest::new(messages, options)).await
    }

    pub async fn send_request(&self, request: &ChatRequest) -> ClientResult<ChatResponse> {
        request.validate().map_err(ClientError::InvalidRequest)?;

        let backend = self.selector.preferred().clone();
        let mut failures = Vec::with_capacity(2);

        let url = format!("{}{}", backend.base_url, MULTIMODAL_CHAT_PATH);
        match self.post_chat(&url, request).await {
            Ok(response) => return Ok(response),
            Err(err) => {
                warn!("Multimodal chat failed on {}: {}", backend.name, err);
                failures.push((format!("{}: {}", url, err), err.is_unreachable()));
            }
        }

        let url = format!("{}{}", backend.base_url, HISTORY_CHAT_PATH);
        let history = HistoryChatRequest::from(request);
        match self.post_chat(&url, &history).await {
            Ok(response) => {
                info!("History chat endpoint answered on {}", backend.name);
                return Ok(response);
            }
            Err(err) => {
                warn!("History chat failed on {}: {}", backend.name, err);
                failures.push((format!("{}: {}", url, err), err.is_unreachable()));
            }
        }

        // next call goes to the other backend
        if failures.iter().all(|(_, unreachable)| *unreachable) {
            self.selector.mark_failure(&backend.name);
        }

        error!("Both chat endpoints failed on {}", backend.name);
        Err(ClientError::Exhausted(
            failures.into_iter().map(|(msg, _)| msg).collect(),
        ))
    }

    async fn post_chat<B>(&self, url: &str, body: &B) -> ClientResult<ChatResponse>
    where
        B: Serialize + Sync + ?Sized,
    {
        let response: ChatResponse = post_json(&self.http, url, body).await?;

        if response.success == Some(false) || response.error.is_some() {
            return Err(ClientError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "success=false without error message".to_string()),
            ));
        }
        if response.response.trim().is_empty() {
            return Err(ClientError::EmptyResult);
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatService for ChatClient {
    async fn send_chat(&self, request: &ChatRequest) -> ClientResult<ChatResponse> {
        self.send_request(request).await
    }
}
