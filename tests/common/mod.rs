#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use env_gateway::publisher::{PublishError, Publisher};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// 업스트림이 받은 요청 정보
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub uri: String,
    pub host: Option<String>,
    pub forwarded_for: Option<String>,
    pub body: Bytes,
}

/// 요청을 기록하고 418 "Hello, client"로 응답하는 테스트 업스트림
pub async fn spawn_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<SeenRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let tx = tx.clone();
                    async move {
                        let header = |name: &str| {
                            req.headers()
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string)
                        };
                        let host = header("host");
                        let forwarded_for = header("x-forwarded-for");
                        let method = req.method().to_string();
                        let uri = req.uri().to_string();
                        let body = req.into_body().collect().await.unwrap().to_bytes();

                        let _ = tx.send(SeenRequest {
                            method,
                            uri,
                            host,
                            forwarded_for,
                            body,
                        });

                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(StatusCode::IM_A_TEAPOT)
                                .header("x-upstream", "yes")
                                .body(Full::new(Bytes::from("Hello, client")))
                                .unwrap(),
                        )
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (addr, rx)
}

/// nsqd가 받은 PUB 명령
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub body: Vec<u8>,
}

/// 발행 응답 방식
#[derive(Debug, Clone, Copy)]
pub enum NsqdReply {
    Ok,
    HeartbeatThenOk,
    /// `OK` 뒤에 하트비트 프레임 앞부분을 붙여 한 번에 쓰고 나머지는 잠시 뒤에 씀
    OkWithSplitHeartbeat,
    /// `OK`로 응답한 뒤 연결을 닫음
    OkThenClose,
    Error,
}

#[derive(Debug, Default)]
pub struct NsqdStats {
    pub connections: AtomicUsize,
    pub nops: AtomicUsize,
    /// 하트비트에 응답하지 않아 끊은 연결 수
    pub dropped: AtomicUsize,
}

impl NsqdStats {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn nops(&self) -> usize {
        self.nops.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

pub struct FakeNsqd {
    pub addr: SocketAddr,
    pub published: mpsc::UnboundedReceiver<Published>,
    pub stats: Arc<NsqdStats>,
}

fn frame(frame_type: u32, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + data.len());
    out.extend_from_slice(&((data.len() as u32 + 4).to_be_bytes()));
    out.extend_from_slice(&frame_type.to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// PUB 명령만 이해하는 가짜 nsqd
pub async fn spawn_nsqd(reply: NsqdReply) -> FakeNsqd {
    spawn_nsqd_with_heartbeat(reply, None).await
}

/// 연결이 `heartbeat` 동안 조용하면 하트비트를 보내고, 다음 간격까지
/// `NOP`이 오지 않으면 연결을 끊는 가짜 nsqd
pub async fn spawn_nsqd_with_heartbeat(reply: NsqdReply, heartbeat: Option<Duration>) -> FakeNsqd {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, published) = mpsc::unbounded_channel();
    let stats = Arc::new(NsqdStats::default());

    let server_stats = stats.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            server_stats.connections.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_nsqd_client(stream, reply, heartbeat, tx.clone(), server_stats.clone()));
        }
    });

    FakeNsqd { addr, published, stats }
}

async fn serve_nsqd_client(
    stream: TcpStream,
    reply: NsqdReply,
    heartbeat: Option<Duration>,
    tx: mpsc::UnboundedSender<Published>,
    stats: Arc<NsqdStats>,
) {
    let mut stream = BufReader::new(stream);

    let mut magic = [0u8; 4];
    if stream.read_exact(&mut magic).await.is_err() || &magic != b"  V2" {
        return;
    }

    let mut awaiting_nop = false;
    loop {
        if let Some(interval) = heartbeat {
            let idle = tokio::time::timeout(interval, stream.fill_buf()).await.is_err();
            if idle {
                if awaiting_nop {
                    stats.dropped.fetch_add(1, Ordering::SeqCst);
                    return;
                }
                if stream.get_mut().write_all(&frame(0, b"_heartbeat_")).await.is_err() {
                    return;
                }
                awaiting_nop = true;
                continue;
            }
        }

        let mut line = String::new();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end();
        if line == "NOP" {
            stats.nops.fetch_add(1, Ordering::SeqCst);
            awaiting_nop = false;
            continue;
        }
        let Some(topic) = line.strip_prefix("PUB ") else {
            return;
        };

        let Ok(size) = stream.read_u32().await else {
            return;
        };
        let mut body = vec![0u8; size as usize];
        if stream.read_exact(&mut body).await.is_err() {
            return;
        }

        let written = match reply {
            NsqdReply::Ok | NsqdReply::OkThenClose => stream.get_mut().write_all(&frame(0, b"OK")).await,
            NsqdReply::HeartbeatThenOk => {
                let mut out = frame(0, b"_heartbeat_");
                out.extend(frame(0, b"OK"));
                awaiting_nop = true;
                stream.get_mut().write_all(&out).await
            }
            NsqdReply::OkWithSplitHeartbeat => {
                let heartbeat_frame = frame(0, b"_heartbeat_");
                let (head, tail) = heartbeat_frame.split_at(6);
                let mut out = frame(0, b"OK");
                out.extend_from_slice(head);
                awaiting_nop = true;
                match stream.get_mut().write_all(&out).await {
                    Ok(()) => {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        stream.get_mut().write_all(tail).await
                    }
                    Err(e) => Err(e),
                }
            }
            NsqdReply::Error => stream.get_mut().write_all(&frame(1, b"E_BAD_MESSAGE PUB failed")).await,
        };
        if written.is_err() {
            return;
        }

        let _ = tx.send(Published {
            topic: topic.to_string(),
            body,
        });

        if let NsqdReply::OkThenClose = reply {
            return;
        }
    }
}

/// 발행 내용을 메모리에 기록하는 발행자
#[derive(Default)]
pub struct MockPublisher {
    pub published: Mutex<Vec<(String, Bytes)>>,
    pub fail: bool,
}

impl MockPublisher {
    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, topic: &str, body: Bytes) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::ConnectionClosed);
        }
        self.published.lock().unwrap().push((topic.to_string(), body));
        Ok(())
    }

    async fn stop(&self) {}

    fn address(&self) -> &str {
        "mock:4150"
    }
}

pub fn mock_publisher() -> Arc<MockPublisher> {
    Arc::new(MockPublisher::default())
}
