//! 메서드와 경로 접두사 기반 라우팅을 위한 핵심 기능을 제공하는 모듈입니다.

mod error;
mod matcher;
mod route;
mod table;

pub use error::RoutingError;
pub use matcher::PathMatcher;
pub use route::{routes_from_env, routes_from_vars, Route};
pub use table::{RouteEntry, RoutingTable};
