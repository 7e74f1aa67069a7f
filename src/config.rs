use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::timing::{Script, Sequencer, StepSource};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read or write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepsConfig {
    /// Seconds to wait after each step, in order.
    Waits(Vec<f64>),
    /// Lua chunk evaluating to a coroutine function.
    #[cfg(feature = "lua")]
    Lua(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerConfig {
    pub name: String,
    #[serde(default)]
    pub auto_restart: bool,
    /// How often the driver thread ticks the sequencer.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
    pub steps: StepsConfig,
}

fn default_poll_interval_ms() -> u64 {
    // Ten frames at 60 Hz.
    166
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            name: "blink".to_string(),
            auto_restart: false,
            poll_interval_ms: default_poll_interval_ms(),
            log_filter: None,
            steps: StepsConfig::Waits(vec![0.2; 4]),
        }
    }
}

impl SequencerConfig {
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path)?;
        Self::from_ron(&ron_string)
    }

    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: SequencerConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "poll_interval_ms must be at least 1".to_string(),
            });
        }
        match &self.steps {
            StepsConfig::Waits(waits) if waits.iter().any(|w| w.is_nan()) => {
                Err(ConfigError::Invalid {
                    reason: "waits must be numbers, found NaN".to_string(),
                })
            }
            StepsConfig::Waits(_) => Ok(()),
            #[cfg(feature = "lua")]
            StepsConfig::Lua(_) => Ok(()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn step_source(&self) -> Result<Arc<dyn StepSource>, ConfigError> {
        match &self.steps {
            StepsConfig::Waits(waits) => Ok(Arc::new(Script::new(waits.clone()))),
            #[cfg(feature = "lua")]
            StepsConfig::Lua(code) => {
                let source = crate::scripting::LuaSteps::new(code).map_err(|e| {
                    ConfigError::Invalid {
                        reason: e.to_string(),
                    }
                })?;
                Ok(Arc::new(source))
            }
        }
    }

    pub fn build_sequencer(&self) -> Result<Sequencer, ConfigError> {
        let source = self.step_source()?;
        Ok(Sequencer::new(Some(source), self.auto_restart))
    }
}
