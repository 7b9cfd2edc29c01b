use dockhand_core::InstanceDescriptor;
use serde::Deserialize;

use crate::config::RegistryConfig;
use crate::errors::RegistryError;

/// Body of a successful login call.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Token lifetime as reported by the registry, seconds. Informational
    /// only; the local validity margin governs renewal.
    #[serde(rename = "tokenTtl", default)]
    pub token_ttl: Option<u64>,
}

/// Raw wire operations against the registry. Register and beat return the
/// upstream HTTP status untouched; interpreting it is the caller's business.
#[allow(async_fn_in_trait)]
pub trait RegistryTransport {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, RegistryError>;

    async fn register(
        &self,
        token: &str,
        instance: &InstanceDescriptor,
    ) -> Result<u16, RegistryError>;

    async fn beat(&self, token: &str, instance: &InstanceDescriptor)
    -> Result<u16, RegistryError>;
}

/// Production transport over HTTP.
pub struct HttpRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn instance_query(instance: &InstanceDescriptor) -> [(&'static str, String); 4] {
        [
            ("serviceName", instance.service_name.clone()),
            ("ip", instance.ip.to_string()),
            ("port", instance.port.to_string()),
            ("namespaceId", instance.namespace_id.to_string()),
        ]
    }
}

impl RegistryTransport for HttpRegistry {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, RegistryError> {
        let response = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::AuthenticationFailure(format!(
                "login returned status {status}"
            )));
        }

        response.json::<LoginResponse>().await.map_err(|e| {
            RegistryError::AuthenticationFailure(format!("login response had no usable token: {e}"))
        })
    }

    async fn register(
        &self,
        token: &str,
        instance: &InstanceDescriptor,
    ) -> Result<u16, RegistryError> {
        let response = self
            .http
            .post(format!("{}/ns/instance", self.base_url))
            .bearer_auth(token)
            .query(&Self::instance_query(instance))
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    async fn beat(
        &self,
        token: &str,
        instance: &InstanceDescriptor,
    ) -> Result<u16, RegistryError> {
        let response = self
            .http
            .put(format!("{}/ns/instance/beat", self.base_url))
            .bearer_auth(token)
            .query(&Self::instance_query(instance))
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU16, Ordering};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{post, put};
    use axum::{Form, Json, Router};
    use tokio::sync::Mutex;

    use super::*;
    use crate::testing::test_instance;

    #[derive(Default)]
    struct MockRegistry {
        login_status: AtomicU16,
        beat_status: AtomicU16,
        last_login_form: Mutex<Option<HashMap<String, String>>>,
        last_authorization: Mutex<Option<String>>,
        last_query: Mutex<Option<HashMap<String, String>>>,
    }

    async fn login(
        State(state): State<Arc<MockRegistry>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        *state.last_login_form.lock().await = Some(form);
        let status = StatusCode::from_u16(state.login_status.load(Ordering::SeqCst)).unwrap();
        (
            status,
            Json(serde_json::json!({ "accessToken": "abc123", "tokenTtl": 18000 })),
        )
    }

    async fn register(
        State(state): State<Arc<MockRegistry>>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> StatusCode {
        record_call(&state, query, &headers).await;
        StatusCode::OK
    }

    async fn beat(
        State(state): State<Arc<MockRegistry>>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> StatusCode {
        record_call(&state, query, &headers).await;
        StatusCode::from_u16(state.beat_status.load(Ordering::SeqCst)).unwrap()
    }

    async fn record_call(
        state: &MockRegistry,
        query: HashMap<String, String>,
        headers: &HeaderMap,
    ) {
        *state.last_query.lock().await = Some(query);
        *state.last_authorization.lock().await = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
    }

    async fn spawn_mock(state: Arc<MockRegistry>) -> SocketAddr {
        state.login_status.store(200, Ordering::SeqCst);
        state.beat_status.store(200, Ordering::SeqCst);
        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/ns/instance", post(register))
            .route("/ns/instance/beat", put(beat))
            .with_state(state);
        let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap())
            .serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    fn transport_for(addr: SocketAddr) -> HttpRegistry {
        let config = RegistryConfig {
            base_url: format!("http://{addr}"),
            ..RegistryConfig::default()
        };
        HttpRegistry::new(&config).unwrap()
    }

    #[tokio::test]
    async fn login_sends_form_credentials_and_parses_token() {
        let state = Arc::new(MockRegistry::default());
        let addr = spawn_mock(state.clone()).await;
        let transport = transport_for(addr);

        let response = transport.login("nacos", "nacos").await.unwrap();
        assert_eq!(response.access_token, "abc123");
        assert_eq!(response.token_ttl, Some(18000));

        let form = state.last_login_form.lock().await.clone().unwrap();
        assert_eq!(form.get("username").map(String::as_str), Some("nacos"));
        assert_eq!(form.get("password").map(String::as_str), Some("nacos"));
    }

    #[tokio::test]
    async fn login_failure_status_is_authentication_failure() {
        let state = Arc::new(MockRegistry::default());
        let addr = spawn_mock(state.clone()).await;
        state.login_status.store(403, Ordering::SeqCst);
        let transport = transport_for(addr);

        let err = transport.login("nacos", "wrong").await.unwrap_err();
        assert!(matches!(err, RegistryError::AuthenticationFailure(_)));
    }

    #[tokio::test]
    async fn register_carries_bearer_token_and_instance_query() {
        let state = Arc::new(MockRegistry::default());
        let addr = spawn_mock(state.clone()).await;
        let transport = transport_for(addr);
        let instance = test_instance();

        let status = transport.register("abc123", &instance).await.unwrap();
        assert_eq!(status, 200);

        let auth = state.last_authorization.lock().await.clone().unwrap();
        assert_eq!(auth, "Bearer abc123");

        let query = state.last_query.lock().await.clone().unwrap();
        assert_eq!(
            query.get("serviceName").map(String::as_str),
            Some(instance.service_name.as_str())
        );
        assert_eq!(
            query.get("ip").map(String::as_str),
            Some(instance.ip.to_string().as_str())
        );
        assert_eq!(
            query.get("port").map(String::as_str),
            Some(instance.port.to_string().as_str())
        );
        assert_eq!(
            query.get("namespaceId").map(String::as_str),
            Some(instance.namespace_id.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn beat_surfaces_upstream_status_untouched() {
        let state = Arc::new(MockRegistry::default());
        let addr = spawn_mock(state.clone()).await;
        let transport = transport_for(addr);
        let instance = test_instance();

        assert_eq!(transport.beat("abc123", &instance).await.unwrap(), 200);

        state.beat_status.store(503, Ordering::SeqCst);
        assert_eq!(transport.beat("abc123", &instance).await.unwrap(), 503);
    }
}
