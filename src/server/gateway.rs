use std::future::Future;
use std::sync::Arc;

use tracing::{info, instrument};

use super::handler::RequestHandler;
use super::listener::ServerListener;
use super::Result;
use crate::backend::{BackendFactory, ProxyConfig};
use crate::routing::{routes_from_env, Route, RoutingTable};
use crate::settings::Settings;

/// 라우트 테이블과 발행 연결을 소유하는 게이트웨이 프로세스 본체
pub struct Gateway {
    settings: Settings,
    routing_table: Arc<RoutingTable>,
    factory: BackendFactory,
}

impl Gateway {
    /// 주어진 라우트로 라우팅 테이블을 한 번 만듭니다. 이후 테이블은 바뀌지 않습니다.
    #[instrument(skip_all, level = "debug", err)]
    pub fn new<I>(settings: Settings, routes: I) -> Result<Self>
    where
        I: IntoIterator<Item = Route>,
    {
        let mut factory = BackendFactory::new(ProxyConfig::default(), settings.nsq.producer_config());
        let routing_table = RoutingTable::from_routes(routes, &mut factory)?;

        info!(
            routes = routing_table.len(),
            publishers = factory.publisher_count(),
            "라우팅 테이블 구성 완료"
        );

        Ok(Self {
            settings,
            routing_table: Arc::new(routing_table),
            factory,
        })
    }

    /// 프로세스 환경 변수에서 설정된 접두사로 라우트를 읽습니다.
    pub fn from_env(settings: Settings) -> Result<Self> {
        let routes = routes_from_env(&settings.routes.prefix);
        Self::new(settings, routes)
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn bind(&self) -> Result<ServerListener> {
        ServerListener::bind(&self.settings.server).await
    }

    /// `shutdown`이 끝날 때까지 요청을 처리한 뒤 발행 연결을 닫습니다.
    #[instrument(skip_all, level = "info", err)]
    pub async fn serve<F>(mut self, listener: ServerListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let handler = Arc::new(RequestHandler::new(
            self.routing_table.clone(),
            &self.settings.server,
        ));

        let result = listener.run(handler, shutdown).await;

        self.factory.stop_publishers().await;
        info!("게이트웨이 종료");

        result
    }
}
