use std::sync::Arc;

use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::facade::FacadeReply;
use crate::models::{
    ChatRequest, ChatResponse, DEFAULT_SEARCH_LIMIT, HealthResponse, IntentKind, QueryRequest,
    QueryResponse, SearchRequest, SearchResponse,
};
use axum::{
    extract::{Json, State},
    response::Json as ResponseJson,
};
use futures::future::join_all;
use tracing::{debug, info};

/// Shown instead of an error when an image search finds nothing
pub const EMPTY_RESULT_MESSAGE: &str = "검색 결과가 없습니다. 다른 검색어로 다시 시도해 주세요.";

/// Health check handler
/// Checks both health endpoints of both backends concurrently and refreshes
/// the backend preference from the results
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> AppResult<ResponseJson<HealthResponse>> {
    debug!("Health check endpoint called");

    let backends = join_all(
        state
            .selector
            .health_targets()
            .into_iter()
            .map(|(backend, endpoint)| state.probe.probe_backend(backend, endpoint)),
    )
    .await;
    state.selector.refresh_from(&backends);
    let response = HealthResponse::from_backends(backends);

    info!("Health check: {}", response.message);
    Ok(ResponseJson(response))
}

/// Unified query handler
/// Classifies the query and answers with either image results or a chat reply
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> AppResult<ResponseJson<QueryResponse>> {
    info!("Query endpoint called with query: {}", payload.query);

    if !payload.is_valid() {
        return Err(AppError::ValidationError(
            "Query cannot be empty or only whitespace".to_string(),
        ));
    }
    if payload.page == Some(0) {
        return Err(AppError::BadRequest("page numbers start at 1".to_string()));
    }

    let context = state.session(payload.session_id.as_deref());
    let session_id = context.session_id().to_string();
    let facade = state.facade(context);

    let reply = facade
        .search_page(
            &payload.query,
            payload.page.unwrap_or(1),
            payload.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        )
        .await?;

    let response = match reply {
        FacadeReply::Images {
            keyword,
            response,
            cached,
        } => {
            info!(
                "Image search returned {} images (cached: {})",
                response.images.len(),
                cached
            );
            let message = response
                .is_empty()
                .then(|| EMPTY_RESULT_MESSAGE.to_string());
            QueryResponse {
                session_id,
                intent: IntentKind::ImageSearch,
                keyword: Some(keyword),
                images: Some(response),
                chat: None,
                message,
            }
        }
        FacadeReply::Chat(chat) => QueryResponse {
            session_id,
            intent: IntentKind::Chat,
            keyword: None,
            images: None,
            chat: Some(chat),
            message: None,
        },
    };

    Ok(ResponseJson(response))
}

/// Image search passthrough with retry and failover
pub async fn search_images_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> AppResult<ResponseJson<SearchResponse>> {
    info!("Image search endpoint called with query: {}", payload.query);

    let response = state.search.search_request(&payload).await?;
    Ok(ResponseJson(response))
}

/// Chat passthrough with endpoint-shape fallback
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> AppResult<ResponseJson<ChatResponse>> {
    info!(
        "Chat endpoint called with {} messages",
        payload.messages.len()
    );

    let response = state.chat.send_request(&payload).await?;
    Ok(ResponseJson(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::selector::MAIN_BACKEND;
    use crate::client::{MULTIMODAL_CHAT_PATH, SEARCH_PATH};
    use crate::config::Config;
    use crate::models::HealthState;
    use crate::test_support::{spawn_backend, unreachable_url};
    use axum::{
        Router,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::{Value, json};
    use std::time::Duration;

    async fn fake_backend() -> String {
        spawn_backend(
            Router::new()
                .route("/health", get(|| async { Json(json!({"status": "healthy"})) }))
                .route(
                    SEARCH_PATH,
                    post(|| async {
                        Json(json!({"images": [], "total_count": 0, "has_more": false}))
                    }),
                )
                .route(
                    MULTIMODAL_CHAT_PATH,
                    post(|Json(body): Json<Value>| async move {
                        Json(json!({
                            "success": true,
                            "response": "안녕하세요! 무엇을 도와드릴까요?",
                            "session_id": body["session_id"]
                        }))
                    }),
                ),
        )
        .await
    }

    async fn state(main: String) -> Arc<AppState> {
        let config = Config {
            main_backend: main,
            test_backend: unreachable_url().await,
            health_timeout: Duration::from_secs(1),
            search_timeout: Duration::from_secs(2),
            chat_timeout: Duration::from_secs(2),
            retry_delay: Duration::from_millis(10),
            ..Config::default()
        };
        Arc::new(AppState::new(config).unwrap())
    }

    fn query(text: &str) -> QueryRequest {
        QueryRequest {
            query: text.to_string(),
            page: None,
            limit: None,
            session_id: None,
        }
    }

    #[tokio::test]
    async fn test_health_check_reports_backends() {
        let state = state(fake_backend().await).await;

        let ResponseJson(health) = health_check(State(state)).await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.backends.len(), 4);
        assert_eq!(health.backends[0].status, HealthState::Healthy);
        assert!(health.backends[0].url.ends_with("/health"));
        assert!(health.backends[1].url.ends_with("/api/v1/health"));
        assert_eq!(health.backends[2].status, HealthState::Offline);
        assert_eq!(health.backends[3].status, HealthState::Offline);
    }

    #[tokio::test]
    async fn test_health_check_reports_failing_api_endpoint() {
        let main = spawn_backend(
            Router::new()
                .route("/health", get(|| async { Json(json!({"status": "healthy"})) }))
                .route(
                    "/api/v1/health",
                    get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
                ),
        )
        .await;
        let state = state(main).await;
        state.selector.mark_failure(MAIN_BACKEND);

        let ResponseJson(health) = health_check(State(state.clone())).await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.backends[0].status, HealthState::Healthy);
        assert_eq!(health.backends[1].status, HealthState::Error);
        assert_eq!(health.backends[1].detail.as_deref(), Some("HTTP 503"));
        assert_eq!(state.selector.preferred().name, MAIN_BACKEND);
    }

    #[tokio::test]
    async fn test_empty_image_result_gets_message() {
        let state = state(fake_backend().await).await;

        let ResponseJson(response) = query_handler(State(state), Json(query("해무 사진을 보여주세요")))
            .await
            .unwrap();
        assert!(matches!(response.intent, IntentKind::ImageSearch));
        assert_eq!(response.keyword.as_deref(), Some("사진"));
        assert_eq!(response.message.as_deref(), Some(EMPTY_RESULT_MESSAGE));
        assert!(response.images.unwrap().images.is_empty());
    }

    #[tokio::test]
    async fn test_chat_query_reuses_session() {
        let state = state(fake_backend().await).await;

        let ResponseJson(first) = query_handler(State(state.clone()), Json(query("안녕하세요")))
            .await
            .unwrap();
        assert!(matches!(first.intent, IntentKind::Chat));
        let chat = first.chat.unwrap();
        assert_eq!(chat.session_id.as_deref(), Some(first.session_id.as_str()));

        let mut follow_up = query("고마워요");
        follow_up.session_id = Some(first.session_id.clone());
        let ResponseJson(second) = query_handler(State(state.clone()), Json(follow_up))
            .await
            .unwrap();
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(state.session(Some(&first.session_id)).history().len(), 4);
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let state = state(fake_backend().await).await;
        let result = query_handler(State(state), Json(query("   "))).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_unreachable_backends_surface_as_bad_gateway() {
        let state = state(unreachable_url().await).await;

        let request = SearchRequest::for_page("터널", 1, 20);
        let result = search_images_handler(State(state), Json(request)).await;
        assert!(matches!(result, Err(AppError::BadGateway(_))));
    }
}
