use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{CacheStats, ResultCache};
use crate::models::{ChatMessage, SearchResponse};

/// Number of chat messages kept per session
pub const MAX_HISTORY: usize = 20;

/// Cache key for image search results
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub query: String,
    pub page: u32,
    pub limit: u32,
}

impl SearchKey {
    pub fn new(query: &str, page: u32, limit: u32) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            page,
            limit,
        }
    }
}

/// Per-conversation state handed to the facade: identity, chat history and
/// the image result cache.
#[derive(Debug)]
pub struct SessionContext {
    session_id: String,
    user_id: Option<String>,
    // held across a whole chat turn so concurrent turns see each other's history
    turn: tokio::sync::Mutex<()>,
    history: Mutex<Vec<ChatMessage>>,
    cache: Mutex<ResultCache<SearchKey, SearchResponse>>,
}

impl SessionContext {
    pub fn new(user_id: Option<String>, cache_capacity: usize) -> Self {
        Self::with_session_id(Uuid::new_v4().to_string(), user_id, cache_capacity)
    }

    pub fn with_session_id(
        session_id: impl Into<String>,
        user_id: Option<String>,
        cache_capacity: usize,
    ) -> Self {
        let session_id = session_id.into();
        debug!("New session {}", session_id);
        Self {
            session_id,
            user_id,
            turn: tokio::sync::Mutex::new(()),
            history: Mutex::new(Vec::new()),
            cache: Mutex::new(ResultCache::new(cache_capacity)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Waits until no other chat turn is running on this session
    pub async fn begin_turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    /// Appends a completed exchange, dropping the oldest messages past
    /// [`MAX_HISTORY`].
    pub fn record_exchange(&self, question: ChatMessage, answer: ChatMessage) {
        let mut history = self.history.lock();
        history.push(question);
        history.push(answer);
        if history.len() > MAX_HISTORY {
            let excess = history.len() - MAX_HISTORY;
            history.drain(..excess);
        }
    }

    pub fn cached_search(&self, key: &SearchKey) -> Option<SearchResponse> {
        self.cache.lock().get(key)
    }

    pub fn store_search(&self, key: SearchKey, response: SearchResponse) {
        self.cache.lock().insert(key, response);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_key_normalizes_query() {
        assert_eq!(
            SearchKey::new("  CCTV 해무 ", 1, 20),
            SearchKey::new("cctv 해무", 1, 20)
        );
        assert_ne!(SearchKey::new("cctv", 1, 20), SearchKey::new("cctv", 2, 20));
    }

    #[test]
    fn test_history_is_capped() {
        let ctx = SessionContext::new(None, 4);
        for i in 0..15 {
            ctx.record_exchange(
                ChatMessage::user(format!("q{}", i)),
                ChatMessage::assistant(format!("a{}", i)),
            );
        }
        let history = ctx.history();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0].content, "q5");
        assert_eq!(history[MAX_HISTORY - 1].content, "a14");
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        let a = SessionContext::new(Some("user-1".into()), 4);
        let b = SessionContext::new(None, 4);
        assert_ne!(a.session_id(), b.session_id());
        assert_eq!(a.user_id(), Some("user-1"));
        assert_eq!(b.user_id(), None);
    }
}
