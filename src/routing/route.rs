use std::env;
use tracing::debug;

/// 환경 변수 한 개에서 얻은 라우트 정의입니다.
///
/// `<PREFIX><METHOD>_<PATH>=<TARGET>` 형태의 변수가 라우트 하나가 됩니다.
///
/// # 필드
///
/// * `method` - HTTP 메서드 토큰 (대소문자 변환 없이 그대로 사용)
/// * `path` - 항상 `/`로 시작하는 경로
/// * `target` - 백엔드를 가리키는 URL 문자열 (비어 있지 않음)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub target: String,
}

impl Route {
    /// `KEY=VALUE` 형태의 환경 변수 항목 하나를 파싱합니다.
    ///
    /// 첫 번째 `=`에서만 분리하며, 라우트 형식이 아니면 `None`을 반환합니다.
    ///
    /// # 예제
    ///
    /// ```
    /// use env_gateway::routing::Route;
    ///
    /// let route = Route::from_env_entry("PROXY_", "PROXY_GET_users=https://users.example.com/").unwrap();
    /// assert_eq!(route.method, "GET");
    /// assert_eq!(route.path, "/users");
    /// assert_eq!(route.target, "https://users.example.com/");
    ///
    /// assert!(Route::from_env_entry("PROXY_", "HOME=/root").is_none());
    /// ```
    pub fn from_env_entry(prefix: &str, entry: &str) -> Option<Self> {
        let (key, value) = entry.split_once('=')?;
        Self::from_env_var(prefix, key, value)
    }

    /// 이미 분리된 키/값 쌍에서 라우트를 만듭니다.
    pub fn from_env_var(prefix: &str, key: &str, value: &str) -> Option<Self> {
        let rest = key.strip_prefix(prefix)?;

        // 값이 비어 있으면 라우트가 없는 것으로 간주
        if value.is_empty() {
            return None;
        }

        // 첫 번째 '_'만 구분자로 사용하고 나머지는 경로에 그대로 남김
        let (method, path) = rest.split_once('_')?;

        Some(Route {
            method: method.to_string(),
            path: format!("/{}", path),
            target: value.to_string(),
        })
    }
}

/// 키/값 쌍 목록에서 파싱에 성공한 라우트만 순서대로 모읍니다.
pub fn routes_from_vars<I, K, V>(prefix: &str, vars: I) -> Vec<Route>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Route::from_env_var(prefix, key.as_ref(), value.as_ref()))
        .collect()
}

/// 프로세스 환경 변수 전체에서 라우트를 수집합니다.
///
/// 열거 순서는 플랫폼에 따라 다르므로 호출자는 순서에 의존하면 안 됩니다.
/// UTF-8이 아닌 항목은 라우트가 될 수 없으므로 조용히 건너뜁니다.
pub fn routes_from_env(prefix: &str) -> Vec<Route> {
    let vars = env::vars_os().filter_map(|(key, value)| {
        match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            _ => None,
        }
    });

    let routes = routes_from_vars(prefix, vars);
    debug!(prefix = %prefix, count = routes.len(), "환경 변수에서 라우트 파싱 완료");
    routes
}
