use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use super::handler::RequestHandler;
use super::Result;
use crate::settings::ServerSettings;

pub struct ServerListener {
    http_listener: TcpListener,
}

impl ServerListener {
    pub async fn bind(settings: &ServerSettings) -> Result<Self> {
        let http_listener = TcpListener::bind(settings.addr).await.map_err(|e| {
            error!(error = %e, addr = %settings.addr, "HTTP 포트 바인딩 실패");
            e
        })?;

        info!(addr = %http_listener.local_addr()?, "HTTP 리스너 시작");

        Ok(Self { http_listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.http_listener.local_addr()?)
    }

    /// `shutdown`이 끝날 때까지 연결을 받아 연결마다 태스크를 띄웁니다.
    pub async fn run<F>(self, handler: Arc<RequestHandler>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.http_listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let handler = handler.clone();
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                if let Err(err) = handler.handle_connection(io, remote_addr).await {
                                    debug!(error = %err, remote = %remote_addr, "HTTP 연결 처리 실패");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "HTTP 연결 수락 실패");
                        }
                    }
                }

                _ = &mut shutdown => {
                    info!("종료 신호 수신, 새 연결 수락 중단");
                    return Ok(());
                }
            }
        }
    }
}
