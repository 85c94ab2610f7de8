use std::collections::HashSet;

use serde::Deserialize;

use faultprobe_core::error::{FaultError, Result};
use faultprobe_core::setup::parse_setup;
use faultprobe_core::PolicyConfig;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    pub version: u32,

    #[serde(default)]
    pub control: ControlSection,

    #[serde(default)]
    pub probes: Vec<ProbeConfig>,
}

impl ControlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(FaultError::Parse(format!(
                "unsupported config version {} (expected 1)",
                self.version
            )));
        }

        let mut seen = HashSet::new();
        for p in &self.probes {
            p.validate()?;
            if !seen.insert(p.name.as_str()) {
                return Err(FaultError::Parse(format!("duplicate probe name: {}", p.name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ControlSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:9464".into()
}

/// One probe point: a full policy, optionally overridden by a setup string.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    pub name: String,

    #[serde(default)]
    pub policy: PolicyConfig,

    /// `<interval>,<probability>,<space>,<times>`, applied after `policy`.
    #[serde(default)]
    pub setup: Option<String>,
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains('/') {
            return Err(FaultError::Parse(format!(
                "invalid probe name {:?} (must be non-empty, no '/')",
                self.name
            )));
        }
        self.policy.validate()?;
        if let Some(s) = &self.setup {
            parse_setup(s)?;
        }
        Ok(())
    }
}
