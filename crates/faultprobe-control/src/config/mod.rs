//! Control config loader (strict parsing).

pub mod schema;

use std::fs;

use faultprobe_core::error::{FaultError, Result};

pub use schema::{ControlConfig, ControlSection, ProbeConfig};

pub fn load_from_file(path: &str) -> Result<ControlConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| FaultError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ControlConfig> {
    let cfg: ControlConfig = serde_yaml::from_str(s)
        .map_err(|e| FaultError::Parse(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
