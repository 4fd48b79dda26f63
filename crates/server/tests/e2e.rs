use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use ipnet::IpNet;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use server::routes::{self, admin::ADMIN_TOKEN_HEADER};
use server::AppState;
use service::fallback::mock::MockFallback;
use service::storage::mock::MockStorage;
use service::storage::MaintenanceStorage;
use service::{MaintenanceEvents, MaintenanceGate};

const TOKEN: &str = "test-admin-token";
/// Reverse proxy in front of the app in these tests.
const PROXY_PEER: &str = "127.0.0.1:40000";

struct TestApp {
    router: Router,
    storage: Arc<MockStorage>,
}

fn app_with(storage: MockStorage, fallback: MockFallback, token: Option<&str>) -> TestApp {
    let storage = Arc::new(storage);
    let gate = MaintenanceGate::new(storage.clone(), Arc::new(fallback), MaintenanceEvents::default());
    let trusted: IpNet = "127.0.0.0/8".parse().expect("loopback cidr");
    let state = AppState::new(Arc::new(gate), token.map(str::to_string), 120).with_trusted_proxies(vec![trusted]);
    TestApp { router: routes::build_router(state, routes::default_app_routes()), storage }
}

fn app(flag: bool, addresses: &str) -> TestApp {
    app_with(MockStorage::with_state(flag, addresses), MockFallback::new(), Some(TOKEN))
}

async fn send(router: &Router, req: Request<Body>) -> anyhow::Result<(StatusCode, axum::http::HeaderMap, Value)> {
    let res = router.clone().oneshot(req).await?;
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = to_bytes(res.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    Ok((status, headers, body))
}

fn get_via(uri: &str, peer: &str, forwarded: &str) -> anyhow::Result<Request<Body>> {
    let mut req = Request::get(uri).header("X-Forwarded-For", forwarded).body(Body::empty())?;
    req.extensions_mut().insert(ConnectInfo(peer.parse::<SocketAddr>()?));
    Ok(req)
}

/// Request relayed by the trusted proxy on behalf of `client`.
fn get_from(uri: &str, client: &str) -> anyhow::Result<Request<Body>> {
    get_via(uri, PROXY_PEER, client)
}

fn admin(method: &str, uri: &str, body: Option<Value>) -> anyhow::Result<Request<Body>> {
    let builder = Request::builder().method(method).uri(uri).header(ADMIN_TOKEN_HEADER, TOKEN);
    Ok(match body {
        Some(b) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string()))?,
        None => builder.body(Body::empty())?,
    })
}

#[tokio::test]
async fn requests_pass_when_maintenance_is_off() -> anyhow::Result<()> {
    let app = app(false, "");
    let (status, _, body) = send(&app.router, get_from("/", "9.9.9.9")?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn blocked_callers_get_503_with_retry_after() -> anyhow::Result<()> {
    let app = app(true, "1.2.3.4,10.0.0.0/8");

    let (status, headers, body) = send(&app.router, get_from("/", "9.9.9.9")?).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers.get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()), Some("120"));
    assert_eq!(body["error"], "service under maintenance");

    // unmatched paths are guarded too
    let (status, _, _) = send(&app.router, get_from("/anything", "9.9.9.9")?).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn allow_listed_callers_pass_during_maintenance() -> anyhow::Result<()> {
    let app = app(true, "1.2.3.4,10.0.0.0/8");
    for client in ["1.2.3.4", "10.20.30.40", "192.168.0.1, 10.0.0.1"] {
        let (status, _, _) = send(&app.router, get_from("/", client)?).await?;
        assert_eq!(status, StatusCode::OK, "{client}");
    }
    Ok(())
}

#[tokio::test]
async fn forwarded_header_from_untrusted_peer_cannot_claim_allow_listed_address() -> anyhow::Result<()> {
    let app = app(true, "10.0.0.0/8");

    let (status, _, _) = send(&app.router, get_via("/", "203.0.113.9:5555", "10.0.0.1")?).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _, _) = send(&app.router, get_via("/", "10.0.0.7:5555", "203.0.113.9")?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn forwarded_header_from_trusted_proxy_names_the_caller() -> anyhow::Result<()> {
    let app = app(true, "10.0.0.0/8");

    let (status, _, _) = send(&app.router, get_via("/", PROXY_PEER, "10.0.0.1")?).await?;
    assert_eq!(status, StatusCode::OK);

    // a client-supplied hop left of the real caller is not trusted
    let (status, _, _) = send(&app.router, get_via("/", PROXY_PEER, "10.0.0.1, 203.0.113.9")?).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn health_metrics_and_admin_bypass_the_guard() -> anyhow::Result<()> {
    let app = app(true, "");

    let (status, _, body) = send(&app.router, get_from("/health", "9.9.9.9")?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let res = app.router.clone().oneshot(get_from("/metrics", "9.9.9.9")?).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let (status, _, body) = send(&app.router, admin("GET", "/admin/maintenance", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"enabled": true, "addresses": []}));
    Ok(())
}

#[tokio::test]
async fn admin_toggles_maintenance_and_allow_list() -> anyhow::Result<()> {
    let app = app(false, "");

    let (status, _, body) = send(&app.router, admin("PUT", "/admin/maintenance", Some(json!({"enabled": true})))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let req = admin("PUT", "/admin/maintenance/addresses", Some(json!({"addresses": "1.2.3.4,10.0.0.0/8"})))?;
    let (status, _, body) = send(&app.router, req).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let (_, _, body) = send(&app.router, admin("GET", "/admin/maintenance", None)?).await?;
    assert_eq!(body, json!({"enabled": true, "addresses": ["1.2.3.4", "10.0.0.0/8"]}));

    let (status, _, _) = send(&app.router, get_from("/", "10.1.1.1")?).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app.router, get_from("/", "192.168.1.1")?).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    send(&app.router, admin("PUT", "/admin/maintenance", Some(json!({"enabled": false})))?).await?;
    let (status, _, _) = send(&app.router, get_from("/", "192.168.1.1")?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn malformed_allow_list_is_rejected_with_400() -> anyhow::Result<()> {
    let app = app(false, "1.2.3.4");
    let req = admin("PUT", "/admin/maintenance/addresses", Some(json!({"addresses": "not valid, spaces"})))?;
    let (status, _, body) = send(&app.router, req).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1001);
    assert_eq!(app.storage.get_addresses().await?, "1.2.3.4");
    Ok(())
}

#[tokio::test]
async fn admin_requires_matching_token() -> anyhow::Result<()> {
    let app = app(false, "");
    let req = Request::get("/admin/maintenance").body(Body::empty())?;
    assert_eq!(send(&app.router, req).await?.0, StatusCode::UNAUTHORIZED);

    let req = Request::get("/admin/maintenance").header(ADMIN_TOKEN_HEADER, "wrong").body(Body::empty())?;
    assert_eq!(send(&app.router, req).await?.0, StatusCode::UNAUTHORIZED);

    let disabled = app_with(MockStorage::new(), MockFallback::new(), None);
    assert_eq!(send(&disabled.router, admin("GET", "/admin/maintenance", None)?).await?.0, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn storage_outage_is_answered_by_the_fallback() -> anyhow::Result<()> {
    let app = app_with(
        MockStorage::with_state(false, ""),
        MockFallback::new().answering_is_on(true).answering_addresses(&["1.2.3.4"]),
        Some(TOKEN),
    );
    app.storage.fail_all().await;

    let (status, _, _) = send(&app.router, get_from("/", "9.9.9.9")?).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _, body) = send(&app.router, admin("GET", "/admin/maintenance", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"enabled": true, "addresses": ["1.2.3.4"]}));
    Ok(())
}

#[tokio::test]
async fn peer_address_is_used_without_forwarding_header() -> anyhow::Result<()> {
    let app = app(true, "127.0.0.1");
    let blocked = app_with(MockStorage::with_state(true, "10.0.0.1"), MockFallback::new(), Some(TOKEN));

    let mut urls = Vec::new();
    for router in [app.router, blocked.router] {
        let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
        let addr: SocketAddr = listener.local_addr()?;
        urls.push(format!("http://{addr}/"));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await {
                eprintln!("server error: {e}");
            }
        });
    }

    let client = reqwest::Client::new();
    assert_eq!(client.get(&urls[0]).send().await?.status(), reqwest::StatusCode::OK);
    assert_eq!(client.get(&urls[1]).send().await?.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}
