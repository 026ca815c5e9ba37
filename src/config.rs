use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::facade::DEFAULT_IMAGE_KEYWORDS;

/// Gateway and client configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub main_backend: String,
    pub test_backend: String,
    pub health_timeout: Duration,
    pub search_timeout: Duration,
    pub chat_timeout: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub cache_capacity: usize,
    pub user_id: Option<String>,
    pub image_keywords: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 8080)?,
            main_backend: backend_var("EXGPT_MAIN_BACKEND", "http://localhost:8001"),
            test_backend: backend_var("EXGPT_TEST_BACKEND", "http://localhost:8200"),
            health_timeout: Duration::from_secs(parse_var("EXGPT_HEALTH_TIMEOUT_SECS", 5)?),
            search_timeout: Duration::from_secs(parse_var("EXGPT_SEARCH_TIMEOUT_SECS", 30)?),
            chat_timeout: Duration::from_secs(parse_var("EXGPT_CHAT_TIMEOUT_SECS", 60)?),
            retry_count: parse_var("EXGPT_RETRY_COUNT", 1)?,
            retry_delay: Duration::from_millis(parse_var("EXGPT_RETRY_DELAY_MS", 1000)?),
            cache_capacity: parse_var("EXGPT_CACHE_CAPACITY", 50)?,
            user_id: env::var("EXGPT_USER_ID").ok().filter(|v| !v.trim().is_empty()),
            image_keywords: env::var("EXGPT_IMAGE_KEYWORDS")
                .ok()
                .map(|raw| parse_keywords(&raw))
                .filter(|kws| !kws.is_empty())
                .unwrap_or_else(default_keywords),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            main_backend: "http://localhost:8001".to_string(),
            test_backend: "http://localhost:8200".to_string(),
            health_timeout: Duration::from_secs(5),
            search_timeout: Duration::from_secs(30),
            chat_timeout: Duration::from_secs(60),
            retry_count: 1,
            retry_delay: Duration::from_millis(1000),
            cache_capacity: 50,
            user_id: None,
            image_keywords: default_keywords(),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn backend_var(name: &str, default: &str) -> String {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .collect()
}

fn default_keywords() -> Vec<String> {
    DEFAULT_IMAGE_KEYWORDS.iter().map(|kw| kw.to_string()).collect()
}
