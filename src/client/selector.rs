use parking_lot::Mutex;
use tracing::{info, warn};

use super::health::{HealthEndpoint, HealthProbe};
use crate::models::HealthStatus;

pub const MAIN_BACKEND: &str = "main";
pub const TEST_BACKEND: &str = "test";

/// A named backend base URL, without trailing slash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub name: String,
    pub base_url: String,
}

impl Backend {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Main,
    Test,
}

impl Slot {
    fn other(self) -> Self {
        match self {
            Slot::Main => Slot::Test,
            Slot::Test => Slot::Main,
        }
    }
}

/// Chooses between the main and test backends
#[derive(Debug)]
pub struct BackendSelector {
    main: Backend,
    test: Backend,
    preferred: Mutex<Slot>,
}

impl BackendSelector {
    pub fn new(main_url: impl Into<String>, test_url: impl Into<String>) -> Self {
        Self {
            main: Backend::new(MAIN_BACKEND, main_url),
            test: Backend::new(TEST_BACKEND, test_url),
            preferred: Mutex::new(Slot::Main),
        }
    }

    pub fn main(&self) -> &Backend {
        &self.main
    }

    pub fn test(&self) -> &Backend {
        &self.test
    }

    pub fn preferred(&self) -> &Backend {
        let slot = *self.preferred.lock();
        self.backend(slot)
    }

    /// Base URLs in the order they should be tried
    pub fn candidates(&self) -> Vec<Backend> {
        let slot = *self.preferred.lock();
        vec![self.backend(slot).clone(), self.backend(slot.other()).clone()]
    }

    pub fn mark_failure(&self, name: &str) {
        let mut preferred = self.preferred.lock();
        if self.backend(*preferred).name == name {
            *preferred = preferred.other();
            warn!(
                "Backend {} failed, switching to {}",
                name,
                self.backend(*preferred).name
            );
        }
    }

    pub fn mark_success(&self, name: &str) {
        let Some(slot) = self.slot_of(name) else {
            return;
        };
        let mut preferred = self.preferred.lock();
        if *preferred != slot {
            info!("Backend {} answered, preferring it from now on", name);
            *preferred = slot;
        }
    }

    /// Every backend paired with every health endpoint, main first
    pub fn health_targets(&self) -> Vec<(&Backend, HealthEndpoint)> {
        [&self.main, &self.test]
            .into_iter()
            .flat_map(|backend| {
                [HealthEndpoint::Root, HealthEndpoint::ApiV1]
                    .into_iter()
                    .map(move |endpoint| (backend, endpoint))
            })
            .collect()
    }

    /// Probes `/health` on both backends one after the other and updates
    /// the preference from the results.
    pub async fn refresh(&self, probe: &HealthProbe) -> Vec<HealthStatus> {
        let statuses = vec![
            probe.probe_backend(&self.main, HealthEndpoint::Root).await,
            probe.probe_backend(&self.test, HealthEndpoint::Root).await,
        ];
        self.refresh_from(&statuses);
        statuses
    }

    /// Updates the preference from already collected statuses: main when any
    /// of its endpoints is healthy, else test, else unchanged.
    pub fn refresh_from(&self, statuses: &[HealthStatus]) {
        let healthy = |backend: &Backend| {
            statuses
                .iter()
                .any(|s| s.backend_name == backend.name && s.status.is_healthy())
        };

        let next = if healthy(&self.main) {
            Slot::Main
        } else if healthy(&self.test) {
            Slot::Test
        } else {
            warn!("Neither backend is healthy, keeping current preference");
            return;
        };
        *self.preferred.lock() = next;
    }

    fn backend(&self, slot: Slot) -> &Backend {
        match slot {
            Slot::Main => &self.main,
            Slot::Test => &self.test,
        }
    }

    fn slot_of(&self, name: &str) -> Option<Slot> {
        if self.main.name == name {
            Some(Slot::Main)
        } else if self.test.name == name {
            Some(Slot::Test)
        } else {
            None
        }
    }
}
