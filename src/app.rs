use std::sync::Arc;

use axum::Router;
use parking_lot::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::ResultCache;
use crate::client::{BackendSelector, ChatClient, HealthProbe, ImageSearchClient};
use crate::config::Config;
use crate::facade::UnifiedFacade;
use crate::routes::create_routes;
use crate::session::SessionContext;

/// Number of live sessions the gateway remembers.
///
/// Sessions are evicted in insertion order, not by last use: once this many
/// newer sessions have been created, the oldest one loses its history even if
/// it is still active.
pub const MAX_SESSIONS: usize = 256;

/// Initialize tracing and logging for the application
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ex_gpt_gateway=info,tower_http=debug,axum::rejection=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Shared gateway state
pub struct AppState {
    pub config: Config,
    pub selector: Arc<BackendSelector>,
    pub probe: HealthProbe,
    pub search: Arc<ImageSearchClient>,
    pub chat: Arc<ChatClient>,
    sessions: Mutex<ResultCache<String, Arc<SessionContext>>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let selector = Arc::new(BackendSelector::new(
            config.main_backend.clone(),
            config.test_backend.clone(),
        ));
        Ok(Self {
            probe: HealthProbe::new(config.health_timeout)?,
            search: Arc::new(ImageSearchClient::from_config(&config, selector.clone())?),
            chat: Arc::new(ChatClient::from_config(&config, selector.clone())?),
            selector,
            sessions: Mutex::new(ResultCache::new(MAX_SESSIONS)),
            config,
        })
    }

    /// Returns the session for `session_id`, creating it when unknown or absent
    pub fn session(&self, session_id: Option<&str>) -> Arc<SessionContext> {
        let mut sessions = self.sessions.lock();
        if let Some(id) = session_id {
            if let Some(ctx) = sessions.get(&id.to_string()) {
                return ctx;
            }
        }

        let ctx = Arc::new(match session_id {
            Some(id) => SessionContext::with_session_id(
                id,
                self.config.user_id.clone(),
                self.config.cache_capacity,
            ),
            None => SessionContext::new(self.config.user_id.clone(), self.config.cache_capacity),
        });
        sessions.insert(ctx.session_id().to_string(), ctx.clone());
        ctx
    }

    pub fn facade(&self, context: Arc<SessionContext>) -> UnifiedFacade {
        UnifiedFacade::new(self.search.clone(), self.chat.clone(), context)
            .with_keywords(self.config.image_keywords.clone())
    }
}

/// Create and configure the Axum application with all routes and middleware
pub fn create_app(config: Config) -> anyhow::Result<Router> {
    info!("Initializing application router");
    info!(
        "Backends: main={} test={}",
        config.main_backend, config.test_backend
    );

    let state = Arc::new(AppState::new(config)?);

    Ok(create_routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
