use std::fmt;

#[derive(Debug)]
pub enum PublishError {
    /// 브로커와의 I/O 실패
    Io(std::io::Error),
    /// 연결, 쓰기, 읽기 시간 초과
    Timeout {
        operation: &'static str,
    },
    /// 브로커가 에러 프레임으로 거절함
    Rejected(String),
    /// 프로토콜 위반 (알 수 없는 프레임 등)
    Protocol(String),
    /// 브로커가 연결을 닫음
    ConnectionClosed,
    /// 이미 중지된 발행자
    Stopped,
}

impl From<std::io::Error> for PublishError {
    fn from(err: std::io::Error) -> Self {
        PublishError::Io(err)
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Io(e) => write!(f, "브로커 I/O 오류: {}", e),
            PublishError::Timeout { operation } => write!(f, "브로커 {} 시간 초과", operation),
            PublishError::Rejected(msg) => write!(f, "브로커가 발행을 거절함: {}", msg),
            PublishError::Protocol(msg) => write!(f, "프로토콜 오류: {}", msg),
            PublishError::ConnectionClosed => write!(f, "브로커가 연결을 닫음"),
            PublishError::Stopped => write!(f, "발행자가 이미 중지됨"),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}
