use std::fmt;

use crate::backend::BackendError;

/// 라우팅 관련 에러를 표현하는 열거형입니다.
#[derive(Debug)]
pub enum RoutingError {
    /// 메서드와 경로에 맞는 라우트가 없음
    RouteNotFound {
        method: String,
        path: String,
    },
    /// 슬래시를 붙인 경로로 등록된 라우트가 있음
    RedirectToSlash {
        location: String,
    },
    /// 잘못된 경로 패턴
    InvalidPathPattern {
        pattern: String,
        reason: String,
    },
    /// HTTP 토큰이 아닌 메서드
    InvalidMethod {
        method: String,
    },
    /// 같은 (메서드, 경로) 조합이 두 번 등록됨
    DuplicateRoute {
        method: String,
        pattern: String,
    },
    /// 라우트의 백엔드 생성 실패
    Backend {
        method: String,
        path: String,
        target: String,
        source: BackendError,
    },
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::RouteNotFound { method, path } =>
                write!(f, "{} {}에 대한 라우트를 찾을 수 없음", method, path),
            RoutingError::RedirectToSlash { location } =>
                write!(f, "{}로 리다이렉트 필요", location),
            RoutingError::InvalidPathPattern { pattern, reason } =>
                write!(f, "잘못된 경로 패턴: {} ({})", pattern, reason),
            RoutingError::InvalidMethod { method } =>
                write!(f, "유효하지 않은 HTTP 메서드: {:?}", method),
            RoutingError::DuplicateRoute { method, pattern } =>
                write!(f, "중복된 라우트: {} {}", method, pattern),
            RoutingError::Backend { method, path, target, source } =>
                write!(f, "{} {} 라우트의 프록시 생성 실패 (대상 {:?}): {}", method, path, target, source),
        }
    }
}

impl std::error::Error for RoutingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend { source, .. } => Some(source),
            _ => None,
        }
    }
}
