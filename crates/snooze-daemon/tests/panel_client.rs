//! Panel client against a local mock panel

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{FixedOffset, TimeZone};
use serde_json::{json, Value};

use snooze_core::error::ApiError;
use snooze_core::traits::ServerControl;
use snooze_core::ServerId;
use snooze_daemon::panel::Credentials;
use snooze_daemon::PanelClient;

#[derive(Default)]
struct PanelState {
    /// Token the panel currently accepts
    valid_token: Option<String>,
    logins: usize,
    /// (path, authorization header) of every authorized endpoint hit
    requests: Vec<(String, Option<String>)>,
    /// Reject every token with this status
    reject_with: Option<StatusCode>,
    /// Fail the server list with this status
    fail_with: Option<StatusCode>,
    stats: Value,
}

#[derive(Clone, Default)]
struct MockPanel(Arc<Mutex<PanelState>>);

impl MockPanel {
    fn with<R>(&self, f: impl FnOnce(&mut PanelState) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    fn authorize(&self, path: String, headers: &HeaderMap) -> Result<(), StatusCode> {
        let header = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        self.with(|state| {
            state.requests.push((path, header.clone()));
            if let Some(status) = state.reject_with {
                return Err(status);
            }
            let expected = state.valid_token.as_ref().map(|t| format!("Bearer {}", t));
            if header.is_some() && header == expected {
                Ok(())
            } else {
                Err(StatusCode::UNAUTHORIZED)
            }
        })
    }

    fn requests_to(&self, path: &str) -> Vec<Option<String>> {
        self.with(|state| {
            state
                .requests
                .iter()
                .filter(|(p, _)| p == path)
                .map(|(_, header)| header.clone())
                .collect()
        })
    }

    fn logins(&self) -> usize {
        self.with(|state| state.logins)
    }
}

async fn login(State(panel): State<MockPanel>, Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if body["username"] != "admin" || body["password"] != "secret" {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let token = panel.with(|state| {
        state.logins += 1;
        let token = format!("token-{}", state.logins);
        state.valid_token = Some(token.clone());
        token
    });
    Ok(Json(json!({ "status": "ok", "data": { "token": token } })))
}

async fn servers(State(panel): State<MockPanel>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    panel.authorize("servers".to_string(), &headers)?;
    if let Some(status) = panel.with(|state| state.fail_with) {
        return Err(status);
    }
    Ok(Json(json!({
        "status": "ok",
        "data": [
            { "server_id": 1, "server_name": "survival", "server_port": 25565, "type": "minecraft-java" },
            { "serverId": "7f3a", "serverName": "creative", "serverPort": 25566, "type": "minecraft-java" }
        ]
    })))
}

async fn stats(
    State(panel): State<MockPanel>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    panel.authorize(format!("servers/{}/stats", id), &headers)?;
    let stats = panel.with(|state| state.stats.clone());
    Ok(Json(json!({ "status": "ok", "data": stats })))
}

async fn action(
    State(panel): State<MockPanel>,
    Path((id, action)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    panel.authorize(format!("servers/{}/action/{}", id, action), &headers)?;
    Ok(Json(json!({ "status": "ok", "data": null })))
}

async fn spawn_panel() -> (MockPanel, SocketAddr) {
    let panel = MockPanel::default();
    let app = Router::new()
        .route("/api/v2/auth/login", post(login))
        .route("/api/v2/servers", get(servers))
        .route("/api/v2/servers/:id/stats", get(stats))
        .route("/api/v2/servers/:id/action/:action", post(action))
        .with_state(panel.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (panel, addr)
}

fn client(addr: SocketAddr, password: &str, offset: FixedOffset) -> PanelClient {
    PanelClient::new(
        &format!("http://{}/api/v2", addr),
        Credentials {
            username: "admin".to_string(),
            password: password.to_string(),
        },
        offset,
        Duration::from_secs(5),
        false,
    )
    .unwrap()
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

#[tokio::test]
async fn test_login_then_bearer_on_every_request() {
    let (panel, addr) = spawn_panel().await;
    let client = client(addr, "secret", utc());

    client.login().await.unwrap();
    let servers = client.list_servers().await.unwrap();

    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0].server_id, ServerId::from(1u64));
    assert_eq!(servers[1].server_id, ServerId::from("7f3a"));
    assert_eq!(servers[1].server_port, 25566);
    assert_eq!(
        panel.requests_to("servers"),
        vec![Some("Bearer token-1".to_string())]
    );
    assert_eq!(panel.logins(), 1);
}

#[tokio::test]
async fn test_stale_token_relogs_and_replays_once() {
    let (panel, addr) = spawn_panel().await;
    let client = client(addr, "secret", utc());
    client.session().replace("stale".to_string()).await;

    client.list_servers().await.unwrap();

    assert_eq!(panel.logins(), 1);
    assert_eq!(
        panel.requests_to("servers"),
        vec![
            Some("Bearer stale".to_string()),
            Some("Bearer token-1".to_string())
        ]
    );
    assert_eq!(client.session().token().await.as_deref(), Some("token-1"));
}

#[tokio::test]
async fn test_first_request_without_token() {
    let (panel, addr) = spawn_panel().await;
    let client = client(addr, "secret", utc());

    client.start_server(&ServerId::from(3u64)).await.unwrap();

    assert_eq!(
        panel.requests_to("servers/3/action/start_server"),
        vec![None, Some("Bearer token-1".to_string())]
    );
}

#[tokio::test]
async fn test_second_rejection_is_auth_error() {
    let (panel, addr) = spawn_panel().await;
    panel.with(|state| state.reject_with = Some(StatusCode::FORBIDDEN));
    let client = client(addr, "secret", utc());

    let err = client.list_servers().await.unwrap_err();

    assert!(err.is_auth(), "expected auth error, got {:?}", err);
    assert_eq!(panel.logins(), 1);
    assert_eq!(panel.requests_to("servers").len(), 2);
}

#[tokio::test]
async fn test_bad_credentials() {
    let (panel, addr) = spawn_panel().await;
    let client = client(addr, "wrong", utc());

    assert!(matches!(client.login().await, Err(ApiError::Auth(_))));

    let err = client.list_servers().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(panel.requests_to("servers").len(), 1);
}

#[tokio::test]
async fn test_server_error_is_status() {
    let (panel, addr) = spawn_panel().await;
    panel.with(|state| state.fail_with = Some(StatusCode::INTERNAL_SERVER_ERROR));
    let client = client(addr, "secret", utc());
    client.login().await.unwrap();

    match client.list_servers().await {
        Err(ApiError::Status { status, url }) => {
            assert_eq!(status, 500);
            assert!(url.ends_with("/api/v2/servers"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert_eq!(panel.logins(), 1);
}

#[tokio::test]
async fn test_not_started_sentinel() {
    let (panel, addr) = spawn_panel().await;
    panel.with(|state| {
        state.stats = json!({
            "running": false,
            "waiting_start": false,
            "started": "False",
            "online": 0,
            "desc": "A Minecraft Server"
        })
    });
    let client = client(addr, "secret", utc());

    let stats = client.fetch_stats(&ServerId::from(1u64)).await.unwrap();

    assert!(!stats.running);
    assert_eq!(stats.started, None);
    assert_eq!(stats.desc, "A Minecraft Server");
}

#[tokio::test]
async fn test_started_converted_to_offset() {
    let (panel, addr) = spawn_panel().await;
    panel.with(|state| {
        state.stats = json!({
            "running": true,
            "waitingStart": false,
            "started": "2024-05-01 15:00:00",
            "online": 2,
            "desc": ""
        })
    });
    let offset = FixedOffset::west_opt(3 * 3600).unwrap();
    let client = client(addr, "secret", offset);

    let stats = client.fetch_stats(&ServerId::from(1u64)).await.unwrap();

    let started = stats.started.unwrap();
    assert_eq!(started, offset.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    assert_eq!(started.offset(), &offset);
    assert_eq!(stats.online, 2);
    assert!(stats.running);
}

#[tokio::test]
async fn test_stop_server_path() {
    let (panel, addr) = spawn_panel().await;
    let client = client(addr, "secret", utc());
    client.login().await.unwrap();

    client.stop_server(&ServerId::from("7f3a")).await.unwrap();

    assert_eq!(
        panel.requests_to("servers/7f3a/action/stop_server"),
        vec![Some("Bearer token-1".to_string())]
    );
}

#[tokio::test]
async fn test_unreachable_panel_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client(addr, "secret", utc());

    assert!(matches!(
        client.list_servers().await,
        Err(ApiError::Transport(_))
    ));
}
