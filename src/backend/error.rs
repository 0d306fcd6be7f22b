use std::fmt;

/// 라우트 대상 URL로 백엔드를 만들 때 발생하는 에러입니다.
#[derive(Debug, PartialEq)]
pub enum BackendError {
    /// URL 파싱 실패
    InvalidUrl {
        target: String,
        source: url::ParseError,
    },
    /// 스킴이 없는 대상 URL
    MissingScheme,
    /// NSQ 토픽 이름 규칙 위반
    InvalidTopicName {
        topic: String,
    },
    /// nsq:// 대상에 브로커 주소가 없음
    MissingBrokerAddress,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::InvalidUrl { target, source } =>
                write!(f, "대상 URL {:?} 파싱 실패: {}", target, source),
            BackendError::MissingScheme =>
                write!(f, "target URL is missing the scheme"),
            BackendError::InvalidTopicName { topic } =>
                write!(f, "Invalid topic name: {:?}", topic),
            BackendError::MissingBrokerAddress =>
                write!(f, "nsq 대상에 브로커 주소가 없음"),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidUrl { source, .. } => Some(source),
            _ => None,
        }
    }
}
