use std::sync::Arc;
use std::time::Duration;

use dockhand_core::InstanceDescriptor;
use metrics::counter;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::credentials::CredentialManager;
use crate::errors::RegistryError;
use crate::transport::RegistryTransport;

/// Periodic liveness loop for a registered instance. Spawn `run` as a
/// background task; it keeps beating at a fixed period for the lifetime of
/// the process unless stopped through its [`HeartbeatHandle`].
pub struct Heartbeat<T> {
    transport: Arc<T>,
    credentials: Arc<CredentialManager<T>>,
    instance: InstanceDescriptor,
    interval: Duration,
}

/// Stop signal for a running heartbeat loop.
pub struct HeartbeatHandle {
    shutdown: watch::Sender<bool>,
}

impl HeartbeatHandle {
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// The loop also stops when the handle is dropped, so keep it alive for as
/// long as beats should flow.
pub fn shutdown_channel() -> (HeartbeatHandle, watch::Receiver<bool>) {
    let (shutdown, receiver) = watch::channel(false);
    (HeartbeatHandle { shutdown }, receiver)
}

impl<T: RegistryTransport> Heartbeat<T> {
    pub fn new(
        transport: Arc<T>,
        credentials: Arc<CredentialManager<T>>,
        instance: InstanceDescriptor,
        interval: Duration,
    ) -> Self {
        Self {
            transport,
            credentials,
            instance,
            interval,
        }
    }

    /// One full beat cycle: make sure the token is valid (renewing it if its
    /// expiry has passed), then send a single liveness request.
    async fn beat_once(&self) -> Result<u16, RegistryError> {
        let token = self.credentials.ensure_valid_token().await?;
        let status = self.transport.beat(&token, &self.instance).await?;
        if (200..300).contains(&status) {
            Ok(status)
        } else {
            Err(RegistryError::BeatFailure { status })
        }
    }

    /// Beats every `interval`, starting one full period after entry. A failed
    /// cycle, whatever the cause, is logged and retried at the next tick;
    /// there is no backoff and no give-up.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "heartbeat loop started for {} (every {:?})",
            self.instance, self.interval
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => match self.beat_once().await {
                    Ok(status) => {
                        counter!("registry_beats_total").increment(1);
                        debug!(
                            "registry heartbeat for {} answered with status {status}",
                            self.instance
                        );
                    }
                    Err(e) => {
                        counter!("registry_beat_failures_total").increment(1);
                        warn!("registry heartbeat for {} failed: {e}", self.instance);
                    }
                },
                _ = shutdown.changed() => {
                    info!("heartbeat loop for {} stopping", self.instance);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::config::RegistryConfig;
    use crate::registration::register_instance;
    use crate::testing::{ManualClock, ScriptedRegistry, test_instance};

    fn heartbeat(
        transport: Arc<ScriptedRegistry>,
        clock: Arc<ManualClock>,
    ) -> Heartbeat<ScriptedRegistry> {
        let credentials = Arc::new(CredentialManager::with_clock(
            transport.clone(),
            &RegistryConfig::default(),
            clock,
        ));
        Heartbeat::new(
            transport,
            credentials,
            test_instance(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn three_beats_in_seventeen_time_units() {
        let transport = Arc::new(ScriptedRegistry::default());
        let (handle, receiver) = shutdown_channel();
        tokio::spawn(heartbeat(transport.clone(), Arc::default()).run(receiver));

        tokio::time::sleep(Duration::from_secs(17)).await;

        // ticks at t=5, 10, 15; one login served all of them
        assert_eq!(transport.beats.load(Ordering::SeqCst), 3);
        assert_eq!(transport.logins.load(Ordering::SeqCst), 1);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_beat_is_followed_by_the_next_scheduled_attempt() {
        let transport = Arc::new(ScriptedRegistry::default());
        transport.beat_status.store(500, Ordering::SeqCst);
        let (handle, receiver) = shutdown_channel();
        tokio::spawn(heartbeat(transport.clone(), Arc::default()).run(receiver));

        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(transport.beats.load(Ordering::SeqCst), 2);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn token_expiring_between_ticks_is_renewed_before_the_next_beat() {
        let transport = Arc::new(ScriptedRegistry::default());
        let clock = Arc::new(ManualClock::default());
        let (handle, receiver) = shutdown_channel();
        tokio::spawn(heartbeat(transport.clone(), clock.clone()).run(receiver));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.beats.load(Ordering::SeqCst), 1);

        // expire the token between tick 1 and tick 2
        clock.advance_secs(16_000);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
        assert_eq!(transport.beats.load(Ordering::SeqCst), 2);
        let events = transport.events.lock().unwrap().clone();
        assert_eq!(events, vec!["login", "beat", "login", "beat"]);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_token_renewal_skips_the_cycle_and_retries_next_tick() {
        let transport = Arc::new(ScriptedRegistry::default());
        transport.fail_logins.store(1, Ordering::SeqCst);
        let (handle, receiver) = shutdown_channel();
        tokio::spawn(heartbeat(transport.clone(), Arc::default()).run(receiver));

        tokio::time::sleep(Duration::from_secs(11)).await;

        // tick 1 lost its cycle to the failed login, tick 2 recovered
        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
        assert_eq!(transport.beats.load(Ordering::SeqCst), 1);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop() {
        let transport = Arc::new(ScriptedRegistry::default());
        let (handle, receiver) = shutdown_channel();
        let task = tokio::spawn(heartbeat(transport.clone(), Arc::default()).run(receiver));

        tokio::time::sleep(Duration::from_secs(6)).await;
        handle.stop();
        task.await.unwrap();

        let beats = transport.beats.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(transport.beats.load(Ordering::SeqCst), beats);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_still_starts_after_a_rejected_registration() {
        let transport = Arc::new(ScriptedRegistry::default());
        transport.register_status.store(500, Ordering::SeqCst);
        let clock = Arc::new(ManualClock::default());
        let credentials = Arc::new(CredentialManager::with_clock(
            transport.clone(),
            &RegistryConfig::default(),
            clock,
        ));

        let err = register_instance(transport.as_ref(), &credentials, &test_instance())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::RegistrationFailure { status: 500 }
        ));

        let hb = Heartbeat::new(
            transport.clone(),
            credentials,
            test_instance(),
            Duration::from_secs(5),
        );
        let (handle, receiver) = shutdown_channel();
        tokio::spawn(hb.run(receiver));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.beats.load(Ordering::SeqCst), 1);
        handle.stop();
    }
}
