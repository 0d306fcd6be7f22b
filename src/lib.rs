//! 환경 변수로 라우트를 정의하는 HTTP 게이트웨이입니다.
//!
//! `PROXY_<METHOD>_<PATH>=<TARGET>` 형태의 환경 변수 하나가 라우트 하나가 됩니다.
//!
//! # 주요 기능
//!
//! - `http://`, `https://` 대상으로의 리버스 프록시
//! - `nsq://host[:port]/topic` 대상으로의 요청 발행
//! - 메서드 + 가장 긴 경로 접두사 기준 라우팅
//!
//! # 예제
//!
//! ```
//! use env_gateway::routing::routes_from_vars;
//!
//! let routes = routes_from_vars("PROXY_", [
//!     ("PROXY_GET_users", "http://users.internal:8080/v1"),
//!     ("PROXY_POST_send", "nsq://broker:4150/events"),
//!     ("HOME", "/root"),
//! ]);
//!
//! assert_eq!(routes.len(), 2);
//! assert!(routes.iter().any(|r| r.method == "GET" && r.path == "/users"));
//! ```

pub mod backend;
pub mod logging;
pub mod publisher;
pub mod routing;
pub mod server;
pub mod settings;
