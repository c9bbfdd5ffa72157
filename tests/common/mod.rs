use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use honeypot::auth::jwt::{self, Claims};
use honeypot::auth::{ADMIN_CAPABILITY, BYPASS_CAPABILITY};
use honeypot::config::Config;
use honeypot::gate::extension::ExtensionRegistry;
use honeypot::gate::log::MemoryBlockLog;
use honeypot::settings::ProtectionConfig;
use honeypot::state::SharedState;
use honeypot::store::MemoryConfigStore;

pub const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough";

/// A running test server instance backed by in-memory stores.
pub struct TestApp {
    pub addr: SocketAddr,
    pub state: SharedState,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token(&self, capabilities: &[&str]) -> String {
        let claims = Claims::new(
            Uuid::now_v7(),
            capabilities.iter().map(|c| c.to_string()).collect(),
        );
        jwt::encode_token(&claims, JWT_SECRET).unwrap()
    }

    pub fn admin_token(&self) -> String {
        self.token(&[ADMIN_CAPABILITY, BYPASS_CAPABILITY])
    }

    /// Fetch a form page, optionally as an authenticated user.
    pub async fn get_form(&self, form_id: &str, token: Option<&str>) -> Response {
        let mut req = self.client.get(self.url(&format!("/forms/{form_id}")));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.expect("get form failed")
    }

    /// Submit form-urlencoded data, return (body, status).
    pub async fn submit_form(
        &self,
        form_id: &str,
        data: &[(&str, &str)],
        token: Option<&str>,
    ) -> (Value, StatusCode) {
        let mut req = self
            .client
            .post(self.url(&format!("/forms/{form_id}")))
            .form(data);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("submit form failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Submit a JSON body, return (body, status).
    pub async fn submit_json(&self, form_id: &str, data: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(&format!("/forms/{form_id}")))
            .json(data)
            .send()
            .await
            .expect("submit json failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Save settings through the admin API, asserting success.
    pub async fn save_settings(&self, settings: &Value) {
        let token = self.admin_token();
        let (body, status) = self.put_auth("/api/v1/settings", &token, settings).await;
        assert_eq!(status, StatusCode::OK, "save settings failed: {body}");
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        timestamp_key: None,
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        max_body_size: 1_048_576,
        trusted_proxies: vec![],
        log_level: "warn".to_string(),
        failure_backoff: None,
        failure_window_secs: 86_400,
        flagged_fields: vec![],
        page_cache_ttl_secs: 300,
    }
}

/// Settings used by most tests: every form protected by the "url" field.
pub fn protect_all(time_limit: u64) -> ProtectionConfig {
    ProtectionConfig {
        element_name: "url".to_string(),
        time_limit,
        protect_all_forms: true,
        log: false,
        form_settings: Default::default(),
    }
}

pub async fn spawn_app(protection: ProtectionConfig) -> TestApp {
    spawn_app_with(protection, test_config(), ExtensionRegistry::new()).await
}

pub async fn spawn_app_with(
    protection: ProtectionConfig,
    config: Config,
    extensions: ExtensionRegistry,
) -> TestApp {
    let store = Arc::new(MemoryConfigStore::with_config(protection));
    let block_log = Arc::new(MemoryBlockLog::default());

    let (app, state) = honeypot::build_app(store, block_log, extensions, config)
        .await
        .expect("Failed to build app");

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        state,
        client,
    }
}

/// Pull the value of the hidden render timestamp out of a form page.
pub fn timestamp_token(html: &str) -> Option<String> {
    let marker = "name=\"honeypot_time\" value=\"";
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}
