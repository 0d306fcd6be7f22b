use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use super::SettingsError;

/// hyper가 허용하는 최소 읽기 버퍼 크기
const MIN_HEADER_BYTES: usize = 8192;

#[derive(Clone, Debug, Deserialize)]
pub struct ServerSettings {
    /// 바인드 주소 (기본값: 0.0.0.0:80, `:8080` 형식도 허용)
    #[serde(default = "default_addr", deserialize_with = "deserialize_addr")]
    pub addr: SocketAddr,

    /// 요청 헤더를 읽는 제한 시간 (초)
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// 요청 하나를 처리하는 제한 시간 (초)
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,

    /// 요청 헤더 최대 크기
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
}

fn default_addr() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 80)) }
fn default_read_timeout_secs() -> u64 { 10 }
fn default_write_timeout_secs() -> u64 { 10 }
fn default_max_header_bytes() -> usize { 1 << 20 }

pub fn parse_env_var<T: std::str::FromStr, F: FnOnce() -> T>(name: &str, default: F) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| SettingsError::EnvVarInvalid {
            var_name: name.to_string(),
            value: val,
            reason: e.to_string(),
        }),
        Err(env::VarError::NotPresent) => Ok(default()),
        Err(e) => Err(SettingsError::EnvVarInvalid {
            var_name: name.to_string(),
            value: "".to_string(),
            reason: e.to_string(),
        }),
    }
}

/// `host:port` 또는 `:port` 형식의 주소를 파싱합니다.
pub fn parse_addr(value: &str) -> Result<SocketAddr, std::net::AddrParseError> {
    if value.starts_with(':') {
        format!("0.0.0.0{}", value).parse()
    } else {
        value.parse()
    }
}

fn deserialize_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_addr(&value).map_err(serde::de::Error::custom)
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        // HTTP_ADDR이 비어 있으면 :80
        let addr = match env::var("HTTP_ADDR") {
            Ok(value) if !value.is_empty() => parse_addr(&value).map_err(|e| SettingsError::EnvVarInvalid {
                var_name: "HTTP_ADDR".to_string(),
                value: value.clone(),
                reason: e.to_string(),
            })?,
            _ => default_addr(),
        };

        let settings = Self {
            addr,
            read_timeout_secs: parse_env_var("GATEWAY_READ_TIMEOUT_SECS", default_read_timeout_secs)?,
            write_timeout_secs: parse_env_var("GATEWAY_WRITE_TIMEOUT_SECS", default_write_timeout_secs)?,
            max_header_bytes: parse_env_var("GATEWAY_MAX_HEADER_BYTES", default_max_header_bytes)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.read_timeout_secs == 0 || self.write_timeout_secs == 0 {
            return Err(SettingsError::InvalidConfig(
                "읽기/쓰기 제한 시간은 0보다 커야 합니다".to_string(),
            ));
        }

        if self.max_header_bytes < MIN_HEADER_BYTES {
            return Err(SettingsError::InvalidConfig(format!(
                "헤더 최대 크기는 {} 이상이어야 합니다: {}",
                MIN_HEADER_BYTES, self.max_header_bytes
            )));
        }

        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            max_header_bytes: default_max_header_bytes(),
        }
    }
}
