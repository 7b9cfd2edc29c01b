//! Scripted test doubles shared by the unit tests in this crate.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};

use dockhand_core::{Clock, InstanceDescriptor};
use uuid::Uuid;

use crate::errors::RegistryError;
use crate::transport::{LoginResponse, RegistryTransport};

pub(crate) fn test_instance() -> InstanceDescriptor {
    InstanceDescriptor::new(
        "dockhand",
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
        31001,
        Uuid::nil(),
    )
}

/// In-memory transport with scripted outcomes and call counters.
pub(crate) struct ScriptedRegistry {
    pub logins: AtomicUsize,
    pub registers: AtomicUsize,
    pub beats: AtomicUsize,
    /// How many upcoming login calls should fail.
    pub fail_logins: AtomicUsize,
    pub register_status: AtomicU16,
    pub beat_status: AtomicU16,
    /// Interleaved record of login/beat calls, for ordering assertions.
    pub events: Mutex<Vec<&'static str>>,
}

impl Default for ScriptedRegistry {
    fn default() -> Self {
        Self {
            logins: AtomicUsize::new(0),
            registers: AtomicUsize::new(0),
            beats: AtomicUsize::new(0),
            fail_logins: AtomicUsize::new(0),
            register_status: AtomicU16::new(200),
            beat_status: AtomicU16::new(200),
            events: Mutex::new(Vec::new()),
        }
    }
}

impl RegistryTransport for ScriptedRegistry {
    async fn login(&self, _username: &str, _password: &str) -> Result<LoginResponse, RegistryError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("login");
        let failing = self.fail_logins.load(Ordering::SeqCst);
        if failing > 0 {
            self.fail_logins.store(failing - 1, Ordering::SeqCst);
            return Err(RegistryError::AuthenticationFailure(
                "scripted login failure".to_string(),
            ));
        }
        Ok(LoginResponse {
            access_token: "abc123".to_string(),
            token_ttl: Some(18_000),
        })
    }

    async fn register(
        &self,
        _token: &str,
        _instance: &InstanceDescriptor,
    ) -> Result<u16, RegistryError> {
        self.registers.fetch_add(1, Ordering::SeqCst);
        Ok(self.register_status.load(Ordering::SeqCst))
    }

    async fn beat(
        &self,
        _token: &str,
        _instance: &InstanceDescriptor,
    ) -> Result<u16, RegistryError> {
        self.beats.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("beat");
        Ok(self.beat_status.load(Ordering::SeqCst))
    }
}

/// Clock that only moves when told to.
#[derive(Default)]
pub(crate) struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn advance_secs(&self, secs: u64) {
        self.now.fetch_add(secs * 1_000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
