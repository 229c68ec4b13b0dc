//! Shared utilities for integration testing: an in-process mock registry.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{post, put},
    Form, Json, Router,
};
use tokio::net::TcpListener;

use registry_client::config::AgentConfig;

/// Everything the mock registry has seen, plus its scripted answers.
#[derive(Debug)]
pub struct MockState {
    pub logins: u32,
    pub login_status: u16,
    pub access_token: String,
    pub token_ttl: u64,

    /// When set, config reads carrying any other token are answered with 403.
    pub accepted_token: Option<String>,
    pub config_gets: Vec<HashMap<String, String>>,
    pub config_status: u16,
    pub config_body: String,

    pub listens: Vec<String>,
    pub listen_headers: Vec<Option<String>>,
    /// Answer for the next long-poll; reset to empty after being served once.
    pub listen_answer: String,
    pub listen_hold: Duration,

    pub registers: Vec<HashMap<String, String>>,
    pub register_status: u16,
    pub register_body: String,
    pub deregisters: Vec<HashMap<String, String>>,
    pub queries: u32,
    pub beats: Vec<HashMap<String, String>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            logins: 0,
            login_status: 200,
            access_token: "tok123".to_string(),
            token_ttl: 18_000,
            accepted_token: None,
            config_gets: Vec::new(),
            config_status: 200,
            config_body: "log_level: DEBUG\n".to_string(),
            listens: Vec::new(),
            listen_headers: Vec::new(),
            listen_answer: String::new(),
            listen_hold: Duration::from_millis(50),
            registers: Vec::new(),
            register_status: 200,
            register_body: "ok".to_string(),
            deregisters: Vec::new(),
            queries: 0,
            beats: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockRegistry {
    pub state: Arc<Mutex<MockState>>,
}

impl MockRegistry {
    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

fn status_response(status: u16, body: String) -> Response {
    (StatusCode::from_u16(status).unwrap(), body).into_response()
}

async fn login(
    State(reg): State<MockRegistry>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (status, token, ttl) = reg.with(|s| {
        s.logins += 1;
        (s.login_status, s.access_token.clone(), s.token_ttl)
    });
    if status != 200 || form.get("password").map(String::as_str) != Some("secret") {
        return status_response(if status == 200 { 403 } else { status }, "unknown user!".into());
    }
    Json(serde_json::json!({
        "accessToken": token,
        "tokenTtl": ttl,
        "globalAdmin": false,
    }))
    .into_response()
}

async fn get_config(
    State(reg): State<MockRegistry>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (status, body) = reg.with(|s| {
        let revoked = s
            .accepted_token
            .as_ref()
            .is_some_and(|accepted| params.get("accessToken") != Some(accepted));
        s.config_gets.push(params);
        if revoked {
            (403, "token invalid!".to_string())
        } else {
            (s.config_status, s.config_body.clone())
        }
    });
    status_response(status, body)
}

async fn listen(
    State(reg): State<MockRegistry>,
    headers: axum::http::HeaderMap,
    body: String,
) -> Response {
    let hold = reg.with(|s| {
        s.listens.push(body);
        s.listen_headers.push(
            headers
                .get("Long-Pulling-Timeout")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
        s.listen_hold
    });
    tokio::time::sleep(hold).await;
    let answer = reg.with(|s| std::mem::take(&mut s.listen_answer));
    status_response(200, answer)
}

async fn register(
    State(reg): State<MockRegistry>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (status, body) = reg.with(|s| {
        s.registers.push(params);
        (s.register_status, s.register_body.clone())
    });
    status_response(status, body)
}

async fn deregister(
    State(reg): State<MockRegistry>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    reg.with(|s| s.deregisters.push(params));
    status_response(200, "ok".into())
}

async fn query(
    State(reg): State<MockRegistry>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    reg.with(|s| s.queries += 1);
    Json(serde_json::json!({
        "service": params.get("serviceName"),
        "ip": params.get("ip"),
        "port": params.get("port").and_then(|p| p.parse::<u16>().ok()),
        "healthy": true,
        "clusterName": "DEFAULT",
        "metadata": {"preserved.register.source": "SPRING_CLOUD"},
    }))
    .into_response()
}

async fn beat(
    State(reg): State<MockRegistry>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    reg.with(|s| s.beats.push(params));
    Json(serde_json::json!({"clientBeatInterval": 5000, "code": 10200, "lightBeatEnabled": true}))
        .into_response()
}

/// Start the mock registry on an ephemeral port and return its base URL.
pub async fn start_mock_registry(registry: MockRegistry) -> String {
    let app = Router::new()
        .route("/nacos/v1/auth/login", post(login))
        .route("/nacos/v1/cs/configs", axum::routing::get(get_config))
        .route("/nacos/v1/cs/configs/listener", post(listen))
        .route(
            "/nacos/v1/ns/instance",
            post(register).delete(deregister).get(query),
        )
        .route("/nacos/v1/ns/instance/beat", put(beat))
        .with_state(registry);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Agent configuration pointing at a mock registry.
pub fn test_config(server_addr: &str) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.registry.server_addr = server_addr.to_string();
    config.registry.username = "nacos".to_string();
    config.registry.password = "secret".to_string();
    config.registry.namespace = "ns-id".to_string();
    config.registry.group = "GROUP".to_string();
    config.instance.app_name = "svc".to_string();
    config.instance.ip = Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
    config.instance.port = 8000;
    config.heartbeat.interval_secs = 1;
    config.listener.long_poll_secs = 1;
    config
}
