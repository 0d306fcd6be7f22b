mod common;

use std::net::SocketAddr;

use common::{spawn_nsqd, spawn_upstream, FakeNsqd, NsqdReply};
use env_gateway::backend::Message;
use env_gateway::routing::Route;
use env_gateway::server::Gateway;
use env_gateway::settings::Settings;
use reqwest::{redirect, StatusCode};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

fn route(method: &str, path: &str, target: String) -> Route {
    Route {
        method: method.to_string(),
        path: path.to_string(),
        target,
    }
}

struct RunningGateway {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<env_gateway::server::Result<()>>,
}

async fn start_gateway(routes: Vec<Route>) -> RunningGateway {
    let mut settings = Settings::default();
    settings.server.addr = SocketAddr::from(([127, 0, 0, 1], 0));

    let gateway = Gateway::new(settings, routes).unwrap();
    let listener = gateway.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(gateway.serve(listener, async {
        let _ = rx.await;
    }));

    RunningGateway { addr, shutdown, task }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_gateway_end_to_end() {
    let (upstream, mut seen) = spawn_upstream().await;
    let FakeNsqd { addr: nsqd, mut published, .. } = spawn_nsqd(NsqdReply::Ok).await;

    let gateway = start_gateway(vec![
        route("GET", "/api", format!("http://{}/base", upstream)),
        route("POST", "/send", format!("nsq://{}/events", nsqd)),
    ])
    .await;
    let base = format!("http://{}", gateway.addr);
    let client = client();

    // 리버스 프록시
    let response = client.get(format!("{}/api/dir", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.text().await.unwrap(), "Hello, client");

    let upstream_req = seen.recv().await.unwrap();
    assert_eq!(upstream_req.uri, "/base/api/dir");
    assert_eq!(upstream_req.host, Some(gateway.addr.to_string()));
    assert_eq!(upstream_req.forwarded_for.as_deref(), Some("127.0.0.1"));

    // 메시지 발행
    let response = client
        .post(format!("{}/send/?x=1", base))
        .body("the body")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let message = published.recv().await.unwrap();
    assert_eq!(message.topic, "events");
    let envelope = Message::decode(&message.body).unwrap();
    assert_eq!(envelope.url, "/send/?x=1");
    assert_eq!(envelope.body, b"the body");

    // 라우트 없음
    let response = client.get(format!("{}/nothing", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), "404 page not found\n");

    let response = client.post(format!("{}/api/dir", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // 슬래시 없는 경로
    let response = client.get(format!("{}/api", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()["location"], "/api/");

    gateway.shutdown.send(()).unwrap();
    gateway.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unreachable_broker_is_bad_gateway() {
    let broker = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let gateway = start_gateway(vec![route("POST", "/send", format!("nsq://{}/events", broker))]).await;

    let response = client()
        .post(format!("http://{}/send/", gateway.addr))
        .body("lost")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    gateway.shutdown.send(()).unwrap();
    gateway.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_invalid_target_fails_startup() {
    let result = Gateway::new(
        Settings::default(),
        vec![route("GET", "/google", "google.com".to_string())],
    );
    match result {
        Err(e) => assert!(e.to_string().contains("missing the scheme"), "{}", e),
        Ok(_) => panic!("gateway should not start"),
    }
}
