use crate::DeviceId;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Mock,
    Replay,
}

/// Settings of a cyclic monitor run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Bus name for `mock`, capture path for `replay`.
    #[serde(default)]
    pub source: Option<String>,
    /// Simulated devices; empty means the backend default.
    #[serde(default)]
    pub devices: Vec<DeviceId>,
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Stop after this many cycles; unbounded if absent.
    #[serde(default)]
    pub cycles: Option<u64>,
    #[serde(default)]
    pub short_frame_every: u64,
    /// Publish a snapshot every this many milliseconds.
    #[serde(default = "default_report_ms")]
    pub report_ms: u64,
}

fn default_period_ms() -> u64 {
    1
}

fn default_report_ms() -> u64 {
    500
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            source: None,
            devices: Vec::new(),
            period_ms: default_period_ms(),
            cycles: None,
            short_frame_every: 0,
            report_ms: default_report_ms(),
        }
    }
}

pub fn parse_config(raw: &str) -> anyhow::Result<MonitorConfig> {
    let cfg: MonitorConfig = serde_yaml::from_str(raw).context("parsing monitor config")?;
    if cfg.period_ms == 0 {
        anyhow::bail!("period_ms must be at least 1");
    }
    if cfg.report_ms == 0 {
        anyhow::bail!("report_ms must be at least 1");
    }
    if cfg.backend == BackendKind::Replay && cfg.source.is_none() {
        anyhow::bail!("replay backend needs a capture `source`");
    }
    Ok(cfg)
}

pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<MonitorConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("loading config: {}", path.display()))
}
