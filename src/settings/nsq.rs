use std::time::Duration;

use serde::Deserialize;

use super::{parse_env_var, SettingsError};
use crate::publisher::ProducerConfig;

/// nsqd 발행 연결 설정 (초 단위)
#[derive(Debug, Clone, Deserialize)]
pub struct NsqSettings {
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

fn default_dial_timeout_secs() -> u64 { 1 }
fn default_read_timeout_secs() -> u64 { 60 }
fn default_write_timeout_secs() -> u64 { 1 }

impl NsqSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let settings = Self {
            dial_timeout_secs: parse_env_var("GATEWAY_NSQ_DIAL_TIMEOUT_SECS", default_dial_timeout_secs)?,
            read_timeout_secs: parse_env_var("GATEWAY_NSQ_READ_TIMEOUT_SECS", default_read_timeout_secs)?,
            write_timeout_secs: parse_env_var("GATEWAY_NSQ_WRITE_TIMEOUT_SECS", default_write_timeout_secs)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.dial_timeout_secs == 0 || self.read_timeout_secs == 0 || self.write_timeout_secs == 0 {
            return Err(SettingsError::InvalidConfig(
                "nsq 제한 시간은 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }

    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            dial_timeout: Duration::from_secs(self.dial_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
        }
    }
}

impl Default for NsqSettings {
    fn default() -> Self {
        Self {
            dial_timeout_secs: default_dial_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}
