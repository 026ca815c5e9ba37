use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::selector::Backend;
use crate::error::ClientError;
use crate::models::{HealthState, HealthStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEndpoint {
    /// `GET /health`
    Root,
    /// `GET /api/v1/health`
    ApiV1,
}

impl HealthEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            HealthEndpoint::Root => "/health",
            HealthEndpoint::ApiV1 => "/api/v1/health",
        }
    }
}

/// Single-shot health checker. Never retries: a stale answer is worse than a
/// failed one here.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    http: reqwest::Client,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn probe_backend(&self, backend: &Backend, endpoint: HealthEndpoint) -> HealthStatus {
        let url = format!("{}{}", backend.base_url, endpoint.path());
        self.probe(&backend.name, &url).await
    }

    /// Probes `url` once and classifies the outcome
    pub async fn probe(&self, backend_name: &str, url: &str) -> HealthStatus {
        debug!("Probing {} at {}", backend_name, url);
        let started = Instant::now();
        let result = self.http.get(url).timeout(self.timeout).send().await;

        let (status, detail) = match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(body) if reports_unhealthy(&body) => (
                        HealthState::Error,
                        Some("backend reports unhealthy".to_string()),
                    ),
                    _ => (HealthState::Healthy, None),
                }
            }
            Ok(response) => (
                HealthState::Error,
                Some(format!("HTTP {}", response.status().as_u16())),
            ),
            Err(err) => match ClientError::from(err) {
                ClientError::Timeout(msg) => (HealthState::Timeout, Some(msg)),
                ClientError::NetworkUnreachable(msg) => (HealthState::Offline, Some(msg)),
                other => (HealthState::Error, Some(other.to_string())),
            },
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        if status.is_healthy() {
            info!("{} is healthy ({} ms)", backend_name, latency_ms);
        } else {
            warn!(
                "{} is {:?}: {}",
                backend_name,
                status,
                detail.as_deref().unwrap_or("-")
            );
        }

        HealthStatus {
            status,
            backend_name: backend_name.to_string(),
            url: url.to_string(),
            latency_ms,
            detail,
        }
    }
}

fn reports_unhealthy(body: &Value) -> bool {
    body.get("status").and_then(Value::as_str) == Some("unhealthy")
}
