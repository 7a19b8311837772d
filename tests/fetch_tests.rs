use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use logpuller::config::parse::parse_config;
use logpuller::config::Config;
use logpuller::fetch::{FetchError, HeaderCheck, LogFetcher, SaasClient, CANONICAL_HEADER};
use logpuller::retrieval::TimeWindow;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct ApiState {
    status: u16,
    body: String,
    delay: Option<Duration>,
    seen: Arc<Mutex<Vec<(HashMap<String, String>, HeaderMap)>>>,
}

async fn forensic(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    state.seen.lock().unwrap().push((params, headers));
    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }
    (
        StatusCode::from_u16(state.status).unwrap(),
        state.body.clone(),
    )
}

async fn start_api(state: ApiState) -> SocketAddr {
    let app = Router::new()
        .route("/mwg/api/reporting/forensic/4242", get(forensic))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr, timeout: &str) -> Config {
    parse_config(&format!(
        r#"
saas:
  customer_id: 4242
  user_id: api@example.com
  password: s3cret
  host: {addr}
  scheme: http
request:
  chunk_increment: 1h
  connection_timeout: {timeout}
checkpoint:
  path: /tmp/unused-checkpoint.json
"#
    ))
    .unwrap()
}

fn client_for(config: &Config) -> SaasClient {
    SaasClient::new(&config.saas, &config.request, &config.proxy).unwrap()
}

#[tokio::test]
async fn test_fetch_sends_window_auth_and_headers() {
    let state = ApiState {
        status: 200,
        body: format!("{}\n\"1\",\"alice\"\n\n\"2\",\"bob\"\n", CANONICAL_HEADER),
        ..Default::default()
    };
    let seen = state.seen.clone();
    let addr = start_api(state).await;
    let client = client_for(&config_for(addr, "5s"));

    let batch = client.fetch(TimeWindow::new(3600, 7199)).await.unwrap();
    assert!(batch.header_matched());
    assert!(!batch.is_no_data());
    assert_eq!(batch.status(), Some(200));
    assert_eq!(batch.records(), &["\"1\",\"alice\"", "\"2\",\"bob\""]);

    let seen = seen.lock().unwrap();
    let (params, headers) = &seen[0];
    assert_eq!(params["filter.requestTimestampFrom"], "3600");
    assert_eq!(params["filter.requestTimestampTo"], "7199");
    assert_eq!(params["order.0.requestTimestamp"], "asc");
    assert_eq!(headers["accept"], "text/csv");
    assert_eq!(headers["x-mwg-api-version"], "5");
    assert!(headers["user-agent"]
        .to_str()
        .unwrap()
        .starts_with("logpuller/"));
    // base64("api@example.com:s3cret")
    assert_eq!(
        headers["authorization"],
        "Basic YXBpQGV4YW1wbGUuY29tOnMzY3JldA=="
    );
}

#[tokio::test]
async fn test_fetch_header_only_is_no_data() {
    let addr = start_api(ApiState {
        status: 200,
        body: format!("{}\n", CANONICAL_HEADER),
        ..Default::default()
    })
    .await;
    let client = client_for(&config_for(addr, "5s"));

    let batch = client.fetch(TimeWindow::new(0, 59)).await.unwrap();
    assert!(batch.is_no_data());
    assert_eq!(batch.count(), 0);
}

#[tokio::test]
async fn test_fetch_header_mismatch_is_not_an_error() {
    let addr = start_api(ApiState {
        status: 200,
        body: "\"user_id\",\"username\",\"new_field\"\n\"1\",\"alice\",\"x\"\n".to_string(),
        ..Default::default()
    })
    .await;
    let client = client_for(&config_for(addr, "5s"));

    let batch = client.fetch(TimeWindow::new(0, 59)).await.unwrap();
    assert!(matches!(batch.header(), HeaderCheck::Mismatch { .. }));
    assert_eq!(batch.count(), 1);
}

#[tokio::test]
async fn test_fetch_non_success_status() {
    let addr = start_api(ApiState {
        status: 401,
        body: "unauthorized".to_string(),
        ..Default::default()
    })
    .await;
    let client = client_for(&config_for(addr, "5s"));

    match client.fetch(TimeWindow::new(0, 59)).await {
        Err(FetchError::Remote { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "unauthorized");
        }
        other => panic!("expected remote error, got {:?}", other.map(|b| b.count())),
    }
}

#[tokio::test]
async fn test_fetch_timeout() {
    let addr = start_api(ApiState {
        status: 200,
        body: format!("{}\n", CANONICAL_HEADER),
        delay: Some(Duration::from_secs(3)),
        ..Default::default()
    })
    .await;
    let client = client_for(&config_for(addr, "200ms"));

    let err = client.fetch(TimeWindow::new(0, 59)).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)), "got {err}");
}
