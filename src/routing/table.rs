use std::collections::HashMap;
use std::sync::Arc;

use hyper::Method;
use tracing::{debug, info, warn};

use crate::backend::{BackendFactory, Handler};
use crate::routing::{PathMatcher, Route, RoutingError};

/// 라우팅 테이블의 항목 하나입니다.
#[derive(Clone)]
pub struct RouteEntry {
    pub matcher: PathMatcher,
    handler: Arc<dyn Handler>,
}

impl RouteEntry {
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn pattern(&self) -> &str {
        &self.matcher.pattern
    }
}

/// (메서드, 경로 접두사) → 핸들러 매핑을 관리하는 구조체입니다.
///
/// 시작 시점에 한 번 채워진 뒤에는 읽기 전용으로 여러 요청이 공유합니다.
#[derive(Clone, Default)]
pub struct RoutingTable {
    // 메서드별 항목은 접두사가 긴 순서로 정렬되어 있음
    routes: HashMap<Method, Vec<RouteEntry>>,
}

impl RoutingTable {
    /// 새로운 라우팅 테이블을 생성합니다.
    pub fn new() -> Self {
        RoutingTable {
            routes: HashMap::new(),
        }
    }

    /// 환경 변수에서 얻은 라우트 목록으로 테이블 전체를 한 번에 구성합니다.
    ///
    /// 각 라우트는 `path + "/"` 접두사로 등록됩니다. 첫 번째 실패에서 중단하며
    /// 일부만 채워진 테이블은 반환하지 않습니다.
    pub fn from_routes<I>(routes: I, factory: &mut BackendFactory) -> Result<Self, RoutingError>
    where
        I: IntoIterator<Item = Route>,
    {
        let mut table = Self::new();

        for route in routes {
            let backend = factory.build(&route.target).map_err(|source| RoutingError::Backend {
                method: route.method.clone(),
                path: route.path.clone(),
                target: route.target.clone(),
                source,
            })?;

            info!(
                method = %route.method,
                path = %route.path,
                target = %route.target,
                kind = backend.kind(),
                "라우트 등록"
            );

            let pattern = format!("{}/", route.path);
            table.add_route(&route.method, &pattern, backend.into_handler())?;
        }

        Ok(table)
    }

    /// 라우팅 테이블에 새로운 라우트를 추가합니다.
    pub fn add_route(
        &mut self,
        method: &str,
        pattern: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RoutingError> {
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| RoutingError::InvalidMethod {
            method: method.to_string(),
        })?;
        let matcher = PathMatcher::from_str(pattern)?;

        let entries = self.routes.entry(method.clone()).or_default();
        if entries.iter().any(|entry| entry.matcher == matcher) {
            return Err(RoutingError::DuplicateRoute {
                method: method.to_string(),
                pattern: matcher.pattern,
            });
        }

        // 등록 순서와 무관하게 가장 긴 접두사가 먼저 검사되도록 유지
        let position = entries
            .iter()
            .position(|entry| entry.matcher.specificity() < matcher.specificity())
            .unwrap_or(entries.len());
        entries.insert(position, RouteEntry { matcher, handler });

        Ok(())
    }

    /// 요청 메서드와 경로에 해당하는 라우트를 찾습니다.
    ///
    /// # 반환
    ///
    /// 가장 긴 접두사로 매칭된 항목을 반환합니다. 매칭되는 항목이 없으면
    /// `RouteNotFound`를, 경로 끝에 `/`만 빠진 경우에는 `RedirectToSlash`를 반환합니다.
    pub fn route_request(&self, method: &Method, path: &str) -> Result<&RouteEntry, RoutingError> {
        let entries = self.routes.get(method).map(Vec::as_slice).unwrap_or_default();

        // `path/`가 정확히 등록되어 있고 `path` 자체는 없으면 접두사 매칭보다 리다이렉트가 우선
        if !path.ends_with('/') && !entries.iter().any(|entry| entry.pattern() == path) {
            let location = format!("{}/", path);
            if entries.iter().any(|entry| entry.pattern() == location) {
                debug!(method = %method, path = %path, "슬래시가 붙은 경로로 리다이렉트");
                return Err(RoutingError::RedirectToSlash { location });
            }
        }

        if let Some(entry) = entries.iter().find(|entry| entry.matcher.matches(path)) {
            debug!(method = %method, path = %path, route = %entry.pattern(), "라우트 찾음");
            return Ok(entry);
        }

        warn!(
            method = %method,
            path = %path,
            available_routes = ?self.patterns(),
            "라우트를 찾을 수 없음"
        );
        Err(RoutingError::RouteNotFound {
            method: method.to_string(),
            path: path.to_string(),
        })
    }

    /// 등록된 `메서드 경로` 목록입니다.
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self
            .routes
            .iter()
            .flat_map(|(method, entries)| {
                entries.iter().map(move |entry| format!("{} {}", method, entry.pattern()))
            })
            .collect();
        patterns.sort();
        patterns
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
