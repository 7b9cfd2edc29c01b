use thiserror::Error;

/// Failures talking to the service registry. All of these are operational
/// concerns: the server logs them and keeps serving.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("registration rejected by registry (status {status})")]
    RegistrationFailure { status: u16 },

    #[error("heartbeat rejected by registry (status {status})")]
    BeatFailure { status: u16 },

    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),
}
