use crate::routing::error::RoutingError;

/// 경로 접두사 매처입니다.
///
/// `/users/`로 등록하면 `/users/`로 시작하는 모든 경로와 매칭됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathMatcher {
    pub pattern: String,
}

impl PathMatcher {
    pub fn from_str(pattern: &str) -> Result<Self, RoutingError> {
        if !pattern.starts_with('/') {
            return Err(RoutingError::InvalidPathPattern {
                pattern: pattern.to_string(),
                reason: "경로는 '/'로 시작해야 합니다".to_string(),
            });
        }

        Ok(PathMatcher {
            pattern: pattern.to_string(),
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.pattern)
    }

    /// 더 긴 접두사가 더 구체적인 라우트입니다.
    pub fn specificity(&self) -> usize {
        self.pattern.len()
    }
}
