//! 라우트 대상 URL로부터 요청 핸들러를 만드는 모듈입니다.
//!
//! 대상 스킴에 따라 두 종류의 핸들러가 만들어집니다.
//!
//! - `http://`, `https://` → [`HttpForwardHandler`] (리버스 프록시)
//! - `nsq://host[:port]/topic` → [`MessagePublishHandler`] (메시지 발행)

mod error;
mod http;
mod message;
mod nsq;

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::publisher::{NsqProducer, ProducerConfig, Publisher};

pub use error::BackendError;
pub use http::{HttpForwardHandler, ProxyConfig};
pub use message::Message;
pub use nsq::{is_valid_topic_name, MessagePublishHandler};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;
pub type ResponseBody = Full<Bytes>;

const NSQ_SCHEME: &str = "nsq";

/// 요청 하나를 처리해 응답 하나를 만드는 기능입니다.
///
/// 라우터는 핸들러의 구체 타입을 알지 못하며, 여러 요청이 동시에 호출합니다.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: Request<RequestBody>) -> Response<ResponseBody>;
}

/// 서버가 요청 확장에 넣어 두는 클라이언트 주소입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// 서버가 받은 본문을 핸들러용 본문으로 바꿉니다.
pub fn incoming_body(body: Incoming) -> RequestBody {
    body.map_err(|e| Box::new(e) as BoxError).boxed_unsync()
}

/// 메모리에 있는 바이트로 요청 본문을 만듭니다.
pub fn full_body(bytes: impl Into<Bytes>) -> RequestBody {
    Full::new(bytes.into())
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

pub(crate) fn error_response(status: StatusCode) -> Response<ResponseBody> {
    let text = status.canonical_reason().unwrap_or("Error");
    let mut response = Response::new(ResponseBody::from(format!("{}\n", text)));
    *response.status_mut() = status;
    response
}

/// 대상 URL 하나로 만들어진 백엔드입니다.
pub enum Backend {
    Http(HttpForwardHandler),
    Publish(MessagePublishHandler),
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Http(_) => "http",
            Backend::Publish(_) => "nsq",
        }
    }

    /// 라우터에 등록할 수 있도록 구체 타입을 지웁니다.
    pub fn into_handler(self) -> Arc<dyn Handler> {
        match self {
            Backend::Http(handler) => Arc::new(handler),
            Backend::Publish(handler) => Arc::new(handler),
        }
    }
}

/// 라우트 대상 문자열로 백엔드를 만드는 팩토리입니다.
///
/// 같은 브로커 주소를 가리키는 메시지 라우트들은 발행자 하나를 공유합니다.
/// 발행자는 프로세스 종료 시 [`BackendFactory::stop_publishers`]로 정리합니다.
pub struct BackendFactory {
    proxy_config: ProxyConfig,
    producer_config: ProducerConfig,
    publishers: HashMap<String, Arc<dyn Publisher>>,
}

impl BackendFactory {
    pub fn new(proxy_config: ProxyConfig, producer_config: ProducerConfig) -> Self {
        Self {
            proxy_config,
            producer_config,
            publishers: HashMap::new(),
        }
    }

    /// 대상 URL을 파싱해 알맞은 백엔드를 만듭니다.
    ///
    /// 네트워크 연결은 하지 않으며 재시도도 하지 않습니다.
    ///
    /// # 예제
    ///
    /// ```
    /// use env_gateway::backend::{Backend, BackendError, BackendFactory, ProxyConfig};
    /// use env_gateway::publisher::ProducerConfig;
    ///
    /// let mut factory = BackendFactory::new(ProxyConfig::new(), ProducerConfig::default());
    ///
    /// match factory.build("nsq://broker:4150/events").unwrap() {
    ///     Backend::Publish(handler) => assert_eq!(handler.topic(), "events"),
    ///     Backend::Http(_) => unreachable!(),
    /// }
    ///
    /// assert_eq!(factory.build("google.com").err(), Some(BackendError::MissingScheme));
    /// ```
    pub fn build(&mut self, target: &str) -> Result<Backend, BackendError> {
        let url = Url::parse(target).map_err(|e| match e {
            // 스킴 없이 첫 경로 조각에 ':'가 있으면 스킴이 깨진 URL로 봄
            url::ParseError::RelativeUrlWithoutBase
                if !target.split('/').next().unwrap_or_default().contains(':') =>
            {
                BackendError::MissingScheme
            }
            source => BackendError::InvalidUrl {
                target: target.to_string(),
                source,
            },
        })?;

        if url.scheme() == NSQ_SCHEME {
            self.build_publish(&url).map(Backend::Publish)
        } else {
            Ok(Backend::Http(HttpForwardHandler::new(url, self.proxy_config.clone())))
        }
    }

    fn build_publish(&mut self, url: &Url) -> Result<MessagePublishHandler, BackendError> {
        // 앞의 '/' 하나만 제거하므로 `//topic`은 잘못된 토픽이 됨
        let topic = url.path().strip_prefix('/').unwrap_or(url.path());
        if !is_valid_topic_name(topic) {
            return Err(BackendError::InvalidTopicName {
                topic: topic.to_string(),
            });
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(BackendError::MissingBrokerAddress),
        };
        let address = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        MessagePublishHandler::new(topic, self.publisher_for(&address))
    }

    fn publisher_for(&mut self, address: &str) -> Arc<dyn Publisher> {
        if let Some(publisher) = self.publishers.get(address) {
            debug!(address = %address, "기존 발행자 재사용");
            return publisher.clone();
        }

        let publisher: Arc<dyn Publisher> =
            Arc::new(NsqProducer::new(address, self.producer_config.clone()));
        self.publishers.insert(address.to_string(), publisher.clone());
        publisher
    }

    /// 지금까지 만든 발행자 수 (브로커 주소 기준)
    pub fn publisher_count(&self) -> usize {
        self.publishers.len()
    }

    /// 모든 발행자를 한 번씩 중지합니다.
    pub async fn stop_publishers(&mut self) {
        for (address, publisher) in self.publishers.drain() {
            publisher.stop().await;
            info!(address = %address, "발행자 정리 완료");
        }
    }
}
