use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const MAX_SEARCH_LIMIT: u32 = 100;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

// -- image search

/// Request body for `POST /api/v1/search/images`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

fn default_limit() -> u32 {
    DEFAULT_SEARCH_LIMIT
}

/// Reads an explicit `null` the same way as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl SearchRequest {
    /// Builds a request for a 1-based page
    pub fn for_page(query: impl Into<String>, page: u32, limit: u32) -> Self {
        Self {
            query: query.into(),
            limit,
            offset: page.saturating_sub(1).saturating_mul(limit),
            filters: Map::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("Query cannot be empty or only whitespace".to_string());
        }
        if self.limit == 0 || self.limit > MAX_SEARCH_LIMIT {
            return Err(format!(
                "limit must be between 1 and {}, got {}",
                MAX_SEARCH_LIMIT, self.limit
            ));
        }
        Ok(())
    }
}

/// A single image hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub offset: u32,
    pub limit: u32,
    pub current_page: u32,
    pub total_pages: u32,
}

/// Response body of the image search endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<ImageItem>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<PageInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

// -- chat

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image_url: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            image_url: None,
        }
    }
}

/// Per-call chat settings that travel alongside the message list
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            user_id: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Normalized chat request; also the body of `POST /api/v1/chat/multimodal`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, options: ChatOptions) -> Self {
        Self {
            messages,
            session_id: options.session_id,
            user_id: options.user_id,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.messages.is_empty() {
            return Err("Chat request must contain at least one message".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 || self.max_tokens > 4000 {
            return Err(format!(
                "max_tokens must be between 1 and 4000, got {}",
                self.max_tokens
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Body of `POST /api/v1/chat`, the history-shaped endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryChatRequest {
    pub history: Vec<HistoryEntry>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub stream: bool,
    pub search_documents: bool,
    pub suggest_questions: bool,
    pub generate_search_query: bool,
}

impl From<&ChatRequest> for HistoryChatRequest {
    fn from(request: &ChatRequest) -> Self {
        Self {
            history: request
                .messages
                .iter()
                .map(|m| HistoryEntry {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
            session_id: request.session_id.clone(),
            user_id: request.user_id.clone(),
            stream: false,
            search_documents: true,
            suggest_questions: true,
            generate_search_query: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub response: String,
    // the backend sends `"sources": null` on successful answers
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggested_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -- health

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Offline,
    Timeout,
    Error,
}

impl HealthState {
    pub fn is_healthy(self) -> bool {
        self == HealthState::Healthy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub backend_name: String,
    pub url: String,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// -- gateway surface

/// Response payload for the gateway health endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub backends: Vec<HealthStatus>,
}

impl HealthResponse {
    pub fn from_backends(backends: Vec<HealthStatus>) -> Self {
        let healthy = backends.iter().filter(|b| b.status.is_healthy()).count();
        let (status, message) = if healthy > 0 {
            ("ok", format!("{}/{} backends healthy", healthy, backends.len()))
        } else {
            ("degraded", "No backend is reachable".to_string())
        };
        Self {
            status: status.to_string(),
            message,
            backends,
        }
    }
}

/// Request payload for the unified query endpoint
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl QueryRequest {
    /// Validates if the query is not empty or just whitespace
    pub fn is_valid(&self) -> bool {
        !self.query.trim().is_empty()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    ImageSearch,
    Chat,
}

/// Response payload for the unified query endpoint
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub session_id: String,
    pub intent: IntentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<SearchResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
