//! Routes a free-form query to image search or chat.
//!
//! Classification is a plain keyword heuristic: the query is lowercased and
//! checked for each keyword in order, and the first keyword found wins.
//! There is no scoring, so a chat question that happens to mention "야간"
//! is sent to image search. The matched keyword is reported back so the
//! caller can tell why.

use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{ChatService, ImageSearch};
use crate::error::ClientResult;
use crate::models::{
    ChatMessage, ChatOptions, ChatRequest, ChatResponse, DEFAULT_SEARCH_LIMIT, SearchRequest,
    SearchResponse,
};
use crate::session::{SearchKey, SessionContext};

/// Image-search keywords in priority order
pub const DEFAULT_IMAGE_KEYWORDS: &[&str] = &[
    "이미지", "사진", "영상", "cctv", "카메라", "해무", "안개", "야간", "image", "photo",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ImageSearch { keyword: String },
    Chat,
}

/// Returns the first keyword contained in `query`, case-insensitively
pub fn classify_with<S: AsRef<str>>(keywords: &[S], query: &str) -> Intent {
    let query = query.to_lowercase();
    keywords
        .iter()
        .map(AsRef::as_ref)
        .find(|kw| !kw.is_empty() && query.contains(&kw.to_lowercase()))
        .map(|kw| Intent::ImageSearch {
            keyword: kw.to_string(),
        })
        .unwrap_or(Intent::Chat)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FacadeReply {
    Images {
        keyword: String,
        response: SearchResponse,
        cached: bool,
    },
    Chat(ChatResponse),
}

pub struct UnifiedFacade {
    search: Arc<dyn ImageSearch>,
    chat: Arc<dyn ChatService>,
    context: Arc<SessionContext>,
    keywords: Vec<String>,
}

impl UnifiedFacade {
    pub fn new(
        search: Arc<dyn ImageSearch>,
        chat: Arc<dyn ChatService>,
        context: Arc<SessionContext>,
    ) -> Self {
        Self {
            search,
            chat,
            context,
            keywords: DEFAULT_IMAGE_KEYWORDS
                .iter()
                .map(|kw| kw.to_string())
                .collect(),
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn classify(&self, query: &str) -> Intent {
        classify_with(&self.keywords, query)
    }

    pub async fn search(&self, query: &str) -> ClientResult<FacadeReply> {
        self.search_page(query, 1, DEFAULT_SEARCH_LIMIT).await
    }

    pub async fn search_page(&self, query: &str, page: u32, limit: u32) -> ClientResult<FacadeReply> {
        match self.classify(query) {
            Intent::ImageSearch { keyword } => {
                info!("Routing '{}' to image search (keyword '{}')", query, keyword);
                self.image_search(query, keyword, page, limit).await
            }
            Intent::Chat => {
                info!("Routing '{}' to chat", query);
                self.chat(query).await
            }
        }
    }

    async fn image_search(
        &self,
        query: &str,
        keyword: String,
        page: u32,
        limit: u32,
    ) -> ClientResult<FacadeReply> {
        let page = page.max(1);
        let key = SearchKey::new(query, page, limit);
        if let Some(response) = self.context.cached_search(&key) {
            debug!("Serving '{}' page {} from cache", query, page);
            return Ok(FacadeReply::Images {
                keyword,
                response,
                cached: true,
            });
        }

        let request = SearchRequest::for_page(query, page, limit);
        let response = self.search.search_images(&request).await?;
        self.context.store_search(key, response.clone());

        Ok(FacadeReply::Images {
            keyword,
            response,
            cached: false,
        })
    }

    async fn chat(&self, query: &str) -> ClientResult<FacadeReply> {
        let _turn = self.context.begin_turn().await;
        let question = ChatMessage::user(query);
        let mut messages = self.context.history();
        messages.push(question.clone());

        let options = ChatOptions {
            session_id: Some(self.context.session_id().to_string()),
            user_id: self.context.user_id().map(str::to_string),
            ..ChatOptions::default()
        };
        let response = self
            .chat
            .send_chat(&ChatRequest::new(messages, options))
            .await?;

        self.context
            .record_exchange(question, ChatMessage::assistant(response.response.clone()));
        Ok(FacadeReply::Chat(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSearch {
        calls: Mutex<Vec<SearchRequest>>,
    }

    #[async_trait]
    impl ImageSearch for RecordingSearch {
        async fn search_images(&self, request: &SearchRequest) -> ClientResult<SearchResponse> {
            self.calls.lock().push(request.clone());
            Ok(SearchResponse {
                images: Vec::new(),
                total_count: 0,
                has_more: false,
                query: Some(request.query.clone()),
                returned_count: Some(0),
                page_info: None,
                search_time_ms: None,
                success: Some(true),
                error: None,
            })
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        calls: Mutex<Vec<ChatRequest>>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ChatService for RecordingChat {
        async fn send_chat(&self, request: &ChatRequest) -> ClientResult<ChatResponse> {
            self.calls.lock().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ClientError::Exhausted(vec!["down".to_string()]));
            }
            Ok(ChatResponse {
                response: format!("reply #{}", self.calls.lock().len()),
                sources: Vec::new(),
                suggested_questions: Vec::new(),
                session_id: request.session_id.clone(),
                message_id: None,
                success: Some(true),
                error: None,
            })
        }
    }

    fn facade(chat_fails: bool) -> (UnifiedFacade, Arc<RecordingSearch>, Arc<RecordingChat>) {
        let search = Arc::new(RecordingSearch::default());
        let chat = Arc::new(RecordingChat {
            fail: chat_fails,
            ..RecordingChat::default()
        });
        let context = Arc::new(SessionContext::with_session_id(
            "session-1",
            Some("user-1".to_string()),
            8,
        ));
        let facade = UnifiedFacade::new(search.clone(), chat.clone(), context);
        (facade, search, chat)
    }

    #[test]
    fn test_classify_examples() {
        assert_eq!(
            classify_with(DEFAULT_IMAGE_KEYWORDS, "해무 사진을 보여주세요"),
            Intent::ImageSearch {
                keyword: "사진".to_string()
            }
        );
        assert_eq!(classify_with(DEFAULT_IMAGE_KEYWORDS, "안녕하세요"), Intent::Chat);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(
            classify_with(DEFAULT_IMAGE_KEYWORDS, "CCTV 화면 찾아줘"),
            Intent::ImageSearch {
                keyword: "cctv".to_string()
            }
        );
        assert_eq!(
            classify_with(&["Photo"], "a PHOTO of the bridge"),
            Intent::ImageSearch {
                keyword: "Photo".to_string()
            }
        );
    }

    #[test]
    fn test_first_keyword_in_list_wins() {
        // "해무" appears first in the query but "사진" ranks higher in the list
        let intent = classify_with(DEFAULT_IMAGE_KEYWORDS, "해무 사진");
        assert_eq!(
            intent,
            Intent::ImageSearch {
                keyword: "사진".to_string()
            }
        );
        let empty: &[&str] = &[];
        assert_eq!(classify_with(empty, "사진"), Intent::Chat);
    }

    #[tokio::test]
    async fn test_keyword_query_goes_to_image_search() {
        let (facade, search, chat) = facade(false);

        let reply = facade.search("해무 사진을 보여주세요").await.unwrap();
        assert!(matches!(reply, FacadeReply::Images { cached: false, .. }));
        assert_eq!(search.calls.lock().len(), 1);
        assert_eq!(search.calls.lock()[0].limit, DEFAULT_SEARCH_LIMIT);
        assert!(chat.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_plain_query_goes_to_chat() {
        let (facade, search, chat) = facade(false);

        let reply = facade.search("안녕하세요").await.unwrap();
        match reply {
            FacadeReply::Chat(response) => assert_eq!(response.response, "reply #1"),
            other => panic!("expected chat reply, got {:?}", other),
        }
        assert!(search.calls.lock().is_empty());

        let calls = chat.calls.lock();
        assert_eq!(calls[0].session_id.as_deref(), Some("session-1"));
        assert_eq!(calls[0].user_id.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_repeat_image_query_is_cached() {
        let (facade, search, _) = facade(false);

        facade.search_page("야간 터널", 2, 10).await.unwrap();
        let reply = facade.search_page("  야간 터널 ", 2, 10).await.unwrap();
        assert!(matches!(reply, FacadeReply::Images { cached: true, .. }));
        assert_eq!(search.calls.lock().len(), 1);
        assert_eq!(search.calls.lock()[0].offset, 10);

        facade.search_page("야간 터널", 3, 10).await.unwrap();
        assert_eq!(search.calls.lock().len(), 2);
        assert_eq!(facade.context().cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_chat_history_accumulates() {
        let (facade, _, chat) = facade(false);

        facade.search("안녕하세요").await.unwrap();
        facade.search("교량 점검 주기는?").await.unwrap();

        let calls = chat.calls.lock();
        assert_eq!(calls[1].messages.len(), 3);
        assert_eq!(calls[1].messages[0].content, "안녕하세요");
        assert_eq!(calls[1].messages[1].content, "reply #1");
        assert_eq!(facade.context().history().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_session_are_serialized() {
        let chat = Arc::new(RecordingChat {
            delay: Some(Duration::from_millis(50)),
            ..RecordingChat::default()
        });
        let context = Arc::new(SessionContext::with_session_id("session-1", None, 8));
        let facade = UnifiedFacade::new(
            Arc::new(RecordingSearch::default()),
            chat.clone(),
            context,
        );

        let (first, second) = tokio::join!(facade.search("안녕하세요"), facade.search("고마워요"));
        first.unwrap();
        second.unwrap();

        let calls = chat.calls.lock();
        assert_eq!(calls[0].messages.len(), 1);
        // the second turn waited and saw the first exchange
        assert_eq!(calls[1].messages.len(), 3);
        assert_eq!(calls[1].messages[1].content, "reply #1");

        let history = facade.context().history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].content, "reply #1");
        assert_eq!(history[2].content, "고마워요");
    }

    #[tokio::test]
    async fn test_failed_chat_leaves_history_untouched() {
        let (facade, _, _) = facade(true);

        let err = facade.search("안녕하세요").await.unwrap_err();
        assert!(matches!(err, ClientError::Exhausted(_)));
        assert!(facade.context().history().is_empty());
    }
}
