//! Shared state for the control surface.
//!
//! Probes declared in the config are built and registered at startup. A probe
//! that fails to register is logged and skipped; the control surface is an
//! optional layer and never stops the process from starting.

use std::sync::Arc;

use faultprobe_core::error::Result;
use faultprobe_core::PolicyState;

use crate::config::ControlConfig;
use crate::obs::metrics::ControlMetrics;
use crate::registry::ProbeRegistry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ControlConfig,
    registry: ProbeRegistry,
    metrics: ControlMetrics,
}

impl AppState {
    pub fn new(cfg: ControlConfig) -> Self {
        let registry = ProbeRegistry::new();

        for p in &cfg.probes {
            let built = PolicyState::from_config(p.name.clone(), &p.policy).and_then(|policy| {
                if let Some(s) = &p.setup {
                    policy.setup(s)?;
                }
                Ok(policy)
            });

            match built.and_then(|policy| registry.register(Arc::new(policy))) {
                Ok(()) => tracing::debug!(probe = %p.name, "probe registered"),
                Err(e) => {
                    tracing::warn!(probe = %p.name, error = %e, "probe not exposed")
                }
            }
        }

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                metrics: ControlMetrics::default(),
            }),
        }
    }

    /// Expose a policy owned by the host program.
    pub fn attach(&self, policy: Arc<PolicyState>) -> Result<()> {
        let name = policy.name().to_string();
        self.inner.registry.register(policy).inspect_err(|e| {
            tracing::warn!(probe = %name, error = %e, "probe not exposed");
        })
    }

    pub fn cfg(&self) -> &ControlConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.inner.registry
    }

    pub fn metrics(&self) -> &ControlMetrics {
        &self.inner.metrics
    }
}
