use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::protocol::{self, Frame};
use super::{PublishError, Publisher};

const DEFAULT_NSQD_TCP_PORT: u16 = 4150;

/// NSQ 발행자 연결 설정입니다.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(1),
        }
    }
}

type Reply = Result<(), PublishError>;

/// nsqd와의 TCP 연결 하나입니다.
///
/// 읽기는 전용 태스크가 맡아 발행 중이 아닐 때 온 하트비트에도 응답합니다.
/// `OK`와 에러 프레임은 `replies`로 발행자에게 전달됩니다.
struct Connection {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    replies: mpsc::UnboundedReceiver<Reply>,
    reader: JoinHandle<()>,
}

impl Connection {
    // 읽기 태스크가 끝났거나 요청하지 않은 응답이 쌓였으면 다시 연결해야 함
    fn is_usable(&mut self) -> bool {
        !self.reader.is_finished() && matches!(self.replies.try_recv(), Err(TryRecvError::Empty))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// nsqd 한 대에 TCP로 메시지를 발행하는 클라이언트입니다.
///
/// 생성 시에는 접속하지 않고 첫 발행 때 연결합니다. 연결 하나를 뮤텍스로
/// 보호하므로 동시에 들어온 발행은 순서대로 처리됩니다. 발행이 실패하거나
/// 브로커가 연결을 끊으면 다음 발행에서 다시 연결합니다.
pub struct NsqProducer {
    address: String,
    dial_address: String,
    config: ProducerConfig,
    connection: Mutex<Option<Connection>>,
    stopped: AtomicBool,
}

impl NsqProducer {
    pub fn new(address: impl Into<String>, config: ProducerConfig) -> Self {
        let address = address.into();
        let dial_address = with_default_port(&address);
        Self {
            address,
            dial_address,
            config,
            connection: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    async fn connect(&self) -> Result<Connection, PublishError> {
        debug!(address = %self.dial_address, "nsqd 연결 시도");

        let mut stream = with_timeout(
            self.config.dial_timeout,
            "연결",
            TcpStream::connect(&self.dial_address),
        )
        .await?;
        stream.set_nodelay(true)?;

        with_timeout(self.config.write_timeout, "쓰기", stream.write_all(protocol::MAGIC_V2)).await?;

        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(Mutex::new(write_half));
        let (tx, replies) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(
            read_half,
            writer.clone(),
            tx,
            self.config.write_timeout,
            self.dial_address.clone(),
        ));

        info!(address = %self.dial_address, "nsqd 연결됨");
        Ok(Connection { writer, replies, reader })
    }

    async fn publish_on(
        &self,
        connection: &mut Connection,
        topic: &str,
        body: &[u8],
    ) -> Result<(), PublishError> {
        let command = protocol::encode_pub(topic, body)?;
        {
            let mut writer = connection.writer.lock().await;
            with_timeout(self.config.write_timeout, "쓰기", writer.write_all(&command)).await?;
        }

        match tokio::time::timeout(self.config.read_timeout, connection.replies.recv()).await {
            Ok(Some(reply)) => reply,
            Ok(None) => Err(PublishError::ConnectionClosed),
            Err(_) => Err(PublishError::Timeout { operation: "읽기" }),
        }
    }
}

#[async_trait]
impl Publisher for NsqProducer {
    async fn publish(&self, topic: &str, body: Bytes) -> Result<(), PublishError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(PublishError::Stopped);
        }

        let mut slot = self.connection.lock().await;

        // 발행 도중 취소되면 연결이 슬롯으로 돌아오지 않고 버려짐
        let mut current = slot.take();
        if let Some(connection) = current.as_mut() {
            if !connection.is_usable() {
                debug!(address = %self.dial_address, "끊긴 nsqd 연결을 버리고 다시 연결합니다");
                current = None;
            }
        }
        let mut connection = match current {
            Some(connection) => connection,
            None => self.connect().await?,
        };

        let result = self.publish_on(&mut connection, topic, &body).await;
        match &result {
            Ok(()) => *slot = Some(connection),
            Err(e) => {
                warn!(address = %self.dial_address, topic = %topic, error = %e, "발행 실패, 연결을 재설정합니다");
            }
        }
        result
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::Release);

        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.take() {
            let mut writer = connection.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                debug!(address = %self.dial_address, error = %e, "nsqd 연결 종료 중 오류");
            }
        }
        info!(address = %self.address, "발행자 중지됨");
    }

    fn address(&self) -> &str {
        &self.address
    }
}

/// 연결의 읽기 쪽을 담당하는 태스크입니다.
///
/// 버퍼는 연결과 수명을 같이 하므로 한 번의 읽기에 여러 프레임이나
/// 잘린 프레임이 섞여 와도 다음 읽기에서 이어서 해석됩니다.
async fn read_loop(
    mut reader: OwnedReadHalf,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    replies: mpsc::UnboundedSender<Reply>,
    write_timeout: Duration,
    address: String,
) {
    let mut buf = BytesMut::with_capacity(64);
    loop {
        let frame = match protocol::decode_frame(&mut buf) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                match reader.read_buf(&mut buf).await {
                    Ok(0) => {
                        debug!(address = %address, "nsqd가 연결을 닫음");
                        let _ = replies.send(Err(PublishError::ConnectionClosed));
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = replies.send(Err(e.into()));
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = replies.send(Err(e));
                return;
            }
        };

        let reply = match frame {
            Frame::Response(data) if data == protocol::HEARTBEAT => {
                debug!(address = %address, "하트비트 수신");
                let mut writer = writer.lock().await;
                if let Err(e) = with_timeout(write_timeout, "쓰기", writer.write_all(protocol::NOP)).await {
                    let _ = replies.send(Err(e));
                    return;
                }
                continue;
            }
            Frame::Response(data) if data == protocol::OK => Ok(()),
            Frame::Response(data) => Err(PublishError::Protocol(format!(
                "예상하지 못한 응답: {}",
                String::from_utf8_lossy(&data)
            ))),
            Frame::Error(data) => Err(PublishError::Rejected(String::from_utf8_lossy(&data).into_owned())),
            Frame::Message(_) => Err(PublishError::Protocol("발행 연결에서 메시지 프레임 수신".to_string())),
        };

        if replies.send(reply).is_err() {
            return;
        }
    }
}

async fn with_timeout<T, E, F>(
    duration: Duration,
    operation: &'static str,
    future: F,
) -> Result<T, PublishError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<PublishError>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(PublishError::Timeout { operation }),
    }
}

// 포트가 없는 주소는 nsqd 기본 TCP 포트로 연결
fn with_default_port(address: &str) -> String {
    let has_port = match address.rsplit_once(':') {
        Some((host, port)) => {
            !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
                && (!host.starts_with('[') || host.ends_with(']'))
        }
        None => false,
    };

    if has_port {
        address.to_string()
    } else {
        format!("{}:{}", address, DEFAULT_NSQD_TCP_PORT)
    }
}
