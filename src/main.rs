use std::process;

use env_gateway::logging::init_logging;
use env_gateway::server::{self, shutdown_signal, Gateway};
use env_gateway::settings::Settings;
use tracing::{error, info};

async fn run(settings: Settings) -> server::Result<()> {
    let gateway = Gateway::from_env(settings)?;
    let listener = gateway.bind().await?;

    info!("Gateway started.");
    gateway.serve(listener, shutdown_signal()).await
}

#[tokio::main]
async fn main() {
    let settings = match Settings::load().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("설정 로드 실패: {}", e);
            process::exit(1);
        }
    };

    let guard = init_logging(&settings.logging);
    info!(prefix = %settings.routes.prefix, addr = %settings.server.addr, "Gateway starting");

    if let Err(e) = run(settings).await {
        error!(error = %e, "게이트웨이 실행 실패");
        // exit 전에 남은 로그를 내보냄
        drop(guard);
        process::exit(1);
    }
}
