use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use regex_lite::Regex;
use tracing::{debug, error};

use super::{error_response, BackendError, Handler, Message, RequestBody, ResponseBody};
use crate::publisher::Publisher;

const MAX_TOPIC_NAME_LENGTH: usize = 64;

fn topic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[.a-zA-Z0-9_-]+(#ephemeral)?$").expect("topic pattern is valid")
    })
}

/// nsqd 토픽 이름 규칙을 검사합니다.
pub fn is_valid_topic_name(topic: &str) -> bool {
    !topic.is_empty() && topic.len() <= MAX_TOPIC_NAME_LENGTH && topic_pattern().is_match(topic)
}

/// HTTP 요청을 메시지 하나로 바꿔 고정된 토픽에 발행하는 핸들러입니다.
///
/// 성공하면 `201`, 본문을 읽지 못하면 `422`, 발행이 실패하면 `502`로
/// 응답합니다. 실패한 메시지는 재시도하거나 보관하지 않습니다.
pub struct MessagePublishHandler {
    topic: String,
    publisher: Arc<dyn Publisher>,
}

impl MessagePublishHandler {
    pub fn new(topic: impl Into<String>, publisher: Arc<dyn Publisher>) -> Result<Self, BackendError> {
        let topic = topic.into();
        if !is_valid_topic_name(&topic) {
            return Err(BackendError::InvalidTopicName { topic });
        }

        Ok(Self { topic, publisher })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn publisher_address(&self) -> &str {
        self.publisher.address()
    }
}

#[async_trait]
impl Handler for MessagePublishHandler {
    async fn handle(&self, req: Request<RequestBody>) -> Response<ResponseBody> {
        let (parts, body) = req.into_parts();
        let url = parts.uri.to_string();

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                error!(url = %url, error = %e, "unable to read the request");
                return error_response(StatusCode::UNPROCESSABLE_ENTITY);
            }
        };

        let payload = match Message::new(url.as_str(), body.to_vec()).encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!(url = %url, error = %e, "unable to serialise the request data");
                return error_response(StatusCode::UNPROCESSABLE_ENTITY);
            }
        };

        if let Err(e) = self.publisher.publish(&self.topic, Bytes::from(payload)).await {
            error!(
                topic = %self.topic,
                address = %self.publisher.address(),
                error = %e,
                "unable to publish to nsq"
            );
            return error_response(StatusCode::BAD_GATEWAY);
        }

        debug!(topic = %self.topic, url = %url, "메시지 발행 완료");
        let mut response = Response::new(ResponseBody::default());
        *response.status_mut() = StatusCode::CREATED;
        response
    }
}
