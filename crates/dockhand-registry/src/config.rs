use std::time::Duration;

/// Connection settings for the service registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL up to and including the API version, e.g.
    /// `http://127.0.0.1:8848/nacos/v1`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// How long a fetched token is treated as valid. Kept comfortably below
    /// the registry's real token lifetime so renewal always happens first.
    pub token_validity: Duration,
    /// Period between liveness beats.
    pub beat_interval: Duration,
    /// Upper bound on any single registry call. An unbounded call here would
    /// stall the beat schedule.
    pub request_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8848/nacos/v1".to_string(),
            username: "nacos".to_string(),
            password: "nacos".to_string(),
            // registry tokens live 18000s; renew well before that
            token_validity: Duration::from_secs(16_000),
            beat_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}
