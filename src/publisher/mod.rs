//! 메시지 브로커로 메시지를 발행하는 클라이언트입니다.

mod error;
mod nsq;
pub mod protocol;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::PublishError;
pub use nsq::{NsqProducer, ProducerConfig};

/// 토픽으로 메시지를 발행하는 기능입니다.
///
/// 여러 요청 태스크가 동시에 `publish`를 호출해도 안전해야 합니다.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, body: Bytes) -> Result<(), PublishError>;

    /// 연결을 정리합니다. 이후의 발행은 실패합니다.
    async fn stop(&self);

    /// 브로커 주소 (`host[:port]`)
    fn address(&self) -> &str;
}
