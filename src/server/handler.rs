use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::Incoming;
use hyper::header::LOCATION;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioTimer;
use tracing::error;
use uuid::Uuid;

use crate::backend::{error_response, incoming_body, ClientAddr, RequestBody, ResponseBody};
use crate::logging::{log_request, RequestLog};
use crate::routing::{RoutingError, RoutingTable};
use crate::settings::ServerSettings;

/// 들어온 요청을 라우팅 테이블에 따라 핸들러로 보내는 서비스입니다.
pub struct RequestHandler {
    routing_table: Arc<RoutingTable>,
    read_timeout: Duration,
    write_timeout: Duration,
    max_header_bytes: usize,
}

impl RequestHandler {
    pub fn new(routing_table: Arc<RoutingTable>, settings: &ServerSettings) -> Self {
        Self {
            routing_table,
            read_timeout: settings.read_timeout(),
            write_timeout: settings.write_timeout(),
            max_header_bytes: settings.max_header_bytes,
        }
    }

    pub async fn handle_request(
        &self,
        req: Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<Response<ResponseBody>, Infallible> {
        let mut req = req.map(incoming_body);
        req.extensions_mut().insert(ClientAddr(remote_addr));
        Ok(self.dispatch(req).await)
    }

    /// 요청 하나를 가장 구체적인 라우트의 핸들러로 보냅니다.
    pub async fn dispatch(&self, req: Request<RequestBody>) -> Response<ResponseBody> {
        let start_time = Instant::now();
        let mut log = RequestLog::new(Uuid::new_v4().to_string());
        log.with_request(&req);

        let routed = self.routing_table.route_request(req.method(), req.uri().path());
        let response = match routed {
            Ok(entry) => {
                log.with_route(entry.pattern());
                match tokio::time::timeout(self.write_timeout, entry.handler().handle(req)).await {
                    Ok(response) => response,
                    Err(_) => {
                        log.with_error(format!("{:?} 안에 응답하지 못함", self.write_timeout));
                        error_response(StatusCode::GATEWAY_TIMEOUT)
                    }
                }
            }
            Err(e) => self.create_routing_error_response(e, req.uri().query()),
        };

        log.with_response(response.status());
        log.duration_ms = start_time.elapsed().as_millis() as u64;
        log_request(&log);

        response
    }

    fn create_routing_error_response(&self, error: RoutingError, query: Option<&str>) -> Response<ResponseBody> {
        let builder = match error {
            RoutingError::RouteNotFound { .. } => {
                return Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(ResponseBody::from("404 page not found\n"))
                    .unwrap_or_else(|_| error_response(StatusCode::NOT_FOUND));
            }
            RoutingError::RedirectToSlash { location } => {
                let location = match query {
                    Some(query) => format!("{}?{}", location, query),
                    None => location,
                };
                Response::builder()
                    .status(StatusCode::MOVED_PERMANENTLY)
                    .header(LOCATION, location)
            }
            other => {
                error!(error = %other, "요청 처리 중 라우팅 에러");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        builder
            .body(ResponseBody::default())
            .unwrap_or_else(|e| {
                error!(error = %e, "에러 응답 생성 실패");
                error_response(StatusCode::INTERNAL_SERVER_ERROR)
            })
    }

    pub async fn handle_connection<I>(&self, io: I, remote_addr: SocketAddr) -> Result<(), hyper::Error>
    where
        I: hyper::rt::Read + hyper::rt::Write + Unpin + 'static,
    {
        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(self.read_timeout)
            .max_buf_size(self.max_header_bytes);

        builder
            .serve_connection(
                io,
                service_fn(|req| self.handle_request(req, remote_addr)),
            )
            .await
    }
}
