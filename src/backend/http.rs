use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Request, Response, StatusCode, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, error, info};
use url::{Position, Url};

use super::{error_response, ClientAddr, Handler, RequestBody, ResponseBody};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

// 프록시가 다음 홉으로 전달하면 안 되는 헤더
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// 모든 HTTP 백엔드가 공유하는 업스트림 클라이언트입니다.
///
/// 커넥션 풀을 공유하므로 복제 비용이 작습니다.
#[derive(Clone)]
pub struct ProxyConfig {
    client: legacy::Client<HttpsConnector<HttpConnector>, RequestBody>,
}

impl ProxyConfig {
    pub fn new() -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = legacy::Client::builder(TokioExecutor::new())
            .build::<_, RequestBody>(connector);

        Self { client }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// 고정된 업스트림으로 요청을 전달하는 핸들러입니다.
///
/// 대상 경로가 `/base`이고 들어온 요청이 `/dir`이면 업스트림 요청 경로는
/// `/base/dir`이 됩니다. Host 헤더는 다시 쓰지 않습니다.
pub struct HttpForwardHandler {
    target: Url,
    config: ProxyConfig,
}

impl HttpForwardHandler {
    /// 스킴은 검사하지 않습니다. 연결할 수 없는 스킴은 요청마다 `502`가 됩니다.
    pub fn new(target: Url, config: ProxyConfig) -> Self {
        Self { target, config }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }
}

#[async_trait]
impl Handler for HttpForwardHandler {
    async fn handle(&self, req: Request<RequestBody>) -> Response<ResponseBody> {
        let proxied_req = match build_proxied_request(&self.target, req) {
            Ok(proxied_req) => proxied_req,
            Err(e) => {
                error!(upstream = %self.target, error = %e, "업스트림 요청 생성 실패");
                return error_response(StatusCode::BAD_REQUEST);
            }
        };

        info!(upstream = %proxied_req.uri(), "Proxying request to upstream");

        let res = match self.config.client.request(proxied_req).await {
            Ok(res) => res,
            Err(e) => {
                error!(upstream = %self.target, error = %e, "Upstream request failed");
                return error_response(StatusCode::BAD_GATEWAY);
            }
        };

        let (mut parts, body) = res.into_parts();
        remove_hop_by_hop_headers(&mut parts.headers);

        match body.collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                debug!(status = %parts.status, bytes_size = bytes.len(), "Response body collected");
                Response::from_parts(parts, ResponseBody::new(bytes))
            }
            Err(e) => {
                error!(upstream = %self.target, error = %e, "Failed to collect response body");
                error_response(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

fn build_proxied_request(
    target: &Url,
    req: Request<RequestBody>,
) -> Result<Request<RequestBody>, hyper::http::Error> {
    let uri = rewrite_uri(target, req.uri())?;

    let (mut parts, body) = req.into_parts();
    remove_hop_by_hop_headers(&mut parts.headers);
    if let Some(ClientAddr(addr)) = parts.extensions.get::<ClientAddr>().copied() {
        append_forwarded_for(&mut parts.headers, &addr.ip().to_string())?;
    }

    parts.uri = uri;
    Ok(Request::from_parts(parts, body))
}

/// 업스트림 기준 URL과 들어온 요청 URI를 합쳐 업스트림 요청 URI를 만듭니다.
pub(crate) fn rewrite_uri(target: &Url, uri: &Uri) -> Result<Uri, hyper::http::uri::InvalidUri> {
    let path = single_joining_slash(target.path(), uri.path());

    let target_query = target.query().unwrap_or("");
    let request_query = uri.query().unwrap_or("");
    let query = if target_query.is_empty() || request_query.is_empty() {
        format!("{}{}", target_query, request_query)
    } else {
        format!("{}&{}", target_query, request_query)
    };

    let authority = &target[Position::BeforeHost..Position::AfterPort];
    let mut rewritten = format!("{}://{}{}", target.scheme(), authority, path);
    if !query.is_empty() {
        rewritten.push('?');
        rewritten.push_str(&query);
    }

    rewritten.parse()
}

fn single_joining_slash(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

fn remove_hop_by_hop_headers(headers: &mut HeaderMap) {
    // Connection 헤더에 나열된 헤더도 홉 단위 헤더로 취급
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client_ip: &str) -> Result<(), hyper::http::Error> {
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client_ip)
    };

    let value = HeaderValue::from_str(&value)?;
    headers.insert(X_FORWARDED_FOR, value);
    Ok(())
}
