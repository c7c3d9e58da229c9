//! Shared helpers for router-level tests.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::connect_info::MockConnectInfo,
    http::{HeaderMap, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use movie_api::{
    app::build_router,
    config::Config,
    services::notifier::{Notifier, NotifyResult},
    state::{AppState, Repositories},
};

pub const PASSWORD: &str = "pa55word-long";

/// Keeps every notification instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, Value)>>,
}

impl RecordingNotifier {
    pub fn activation_token_for(&self, recipient: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _, _)| to == recipient)
            .and_then(|(_, _, data)| data["activationToken"].as_str().map(String::from))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, template: &str, data: &Value) -> NotifyResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), template.to_string(), data.clone()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

pub fn peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40_000))
}

pub fn config_without_limiter() -> Config {
    let mut config = Config::default();
    config.limiter.enabled = false;
    config
}

pub fn spawn_app(config: Config) -> TestApp {
    let app = spawn_app_without_peer(config);
    TestApp {
        router: app.router.layer(MockConnectInfo(peer())),
        ..app
    }
}

/// No `ConnectInfo` is attached to requests.
pub fn spawn_app_without_peer(config: Config) -> TestApp {
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::new(config, Repositories::in_memory(), notifier.clone());
    let router = build_router(state.clone());

    TestApp {
        router,
        state,
        notifier,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Register a user and return its id.
    pub async fn register(&self, email: &str) -> Uuid {
        let res = self
            .request(
                "POST",
                "/v1/users",
                None,
                Some(json!({ "name": "Alice", "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);

        res.body["user"]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn activation_token(&self, email: &str) -> String {
        self.state
            .tasks
            .wait_idle(Duration::from_secs(10))
            .await
            .unwrap();
        self.notifier
            .activation_token_for(email)
            .expect("welcome notification was sent")
    }

    pub async fn activate(&self, email: &str) {
        let token = self.activation_token(email).await;
        let res = self
            .request(
                "PUT",
                "/v1/users/activated",
                None,
                Some(json!({ "token": token })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    }

    pub async fn login(&self, email: &str) -> String {
        let res = self
            .request(
                "POST",
                "/v1/tokens/authentication",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);

        res.body["authentication_token"]["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Registered, activated and logged in; returns (user id, bearer token).
    pub async fn activated_user(&self, email: &str) -> (Uuid, String) {
        let id = self.register(email).await;
        self.activate(email).await;
        (id, self.login(email).await)
    }

    pub async fn grant(&self, user_id: Uuid, codes: &[&'static str]) {
        self.state
            .permissions
            .add_for_user(user_id, codes)
            .await
            .unwrap();
    }
}
