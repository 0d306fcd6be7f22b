use std::{env, path::Path};

use serde::Deserialize;
use tracing::debug;

mod error;
pub mod logging;
mod nsq;
mod server;

pub use error::SettingsError;
pub use logging::{LogFormat, LogOutput, LogSettings};
pub use nsq::NsqSettings;
pub use server::{parse_addr, parse_env_var, ServerSettings};

pub type Result<T> = std::result::Result<T, SettingsError>;

/// 환경 변수 라우트 설정
#[derive(Debug, Clone, Deserialize)]
pub struct RouteSettings {
    /// 라우트 환경 변수 접두사 (빈 문자열 허용)
    #[serde(default = "default_route_prefix")]
    pub prefix: String,
}

fn default_route_prefix() -> String {
    "PROXY_".to_string()
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            prefix: default_route_prefix(),
        }
    }
}

impl RouteSettings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            prefix: env::var("GATEWAY_ROUTE_PREFIX").unwrap_or_else(|_| default_route_prefix()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    // 서버 설정
    #[serde(default)]
    pub server: ServerSettings,

    // 로깅 설정
    #[serde(default)]
    pub logging: LogSettings,

    #[serde(default)]
    pub routes: RouteSettings,

    #[serde(default)]
    pub nsq: NsqSettings,
}

impl Settings {
    /// `GATEWAY_CONFIG_FILE`이 있으면 TOML 파일에서, 없으면 환경 변수에서 설정을 읽습니다.
    ///
    /// 라우트 정의 자체는 항상 환경 변수에서 읽습니다.
    pub async fn load() -> Result<Self> {
        if let Ok(config_path) = env::var("GATEWAY_CONFIG_FILE") {
            Self::from_toml_file(&config_path).await
        } else {
            Self::from_env()
        }
    }

    pub async fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("설정 파일 로드: {}", path.display());

        let content = tokio::fs::read_to_string(path).await.map_err(|e| SettingsError::FileError {
            path: path.to_string_lossy().to_string(),
            error: e,
        })?;

        let settings: Self = toml::from_str(&content)
            .map_err(|e| SettingsError::ParseError { source: e })?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_env() -> Result<Self> {
        let settings = Self {
            server: ServerSettings::from_env()?,
            logging: LogSettings::from_env()?,
            routes: RouteSettings::from_env()?,
            nsq: NsqSettings::from_env()?,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.nsq.validate()?;
        Ok(())
    }
}
