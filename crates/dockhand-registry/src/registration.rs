use dockhand_core::InstanceDescriptor;
use tracing::info;

use crate::credentials::CredentialManager;
use crate::errors::RegistryError;
use crate::transport::RegistryTransport;

/// One-shot instance registration. The registry lists the instance afterwards
/// but only heartbeats confirm it alive, so a rejected registration is
/// reported to the caller rather than treated as fatal: once beats start the
/// registry tolerates a late or retried registration.
pub async fn register_instance<T: RegistryTransport>(
    transport: &T,
    credentials: &CredentialManager<T>,
    instance: &InstanceDescriptor,
) -> Result<(), RegistryError> {
    let token = credentials.ensure_valid_token().await?;
    let status = transport.register(&token, instance).await?;
    info!("registry registration for {instance} answered with status {status}");

    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(RegistryError::RegistrationFailure { status })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::config::RegistryConfig;
    use crate::testing::{ManualClock, ScriptedRegistry, test_instance};

    #[tokio::test]
    async fn successful_registration_uses_a_fresh_token() {
        let transport = Arc::new(ScriptedRegistry::default());
        let credentials = CredentialManager::with_clock(
            transport.clone(),
            &RegistryConfig::default(),
            Arc::new(ManualClock::default()),
        );

        register_instance(transport.as_ref(), &credentials, &test_instance())
            .await
            .unwrap();
        assert_eq!(transport.logins.load(Ordering::SeqCst), 1);
        assert_eq!(transport.registers.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_registration_reports_the_status() {
        let transport = Arc::new(ScriptedRegistry::default());
        transport.register_status.store(500, Ordering::SeqCst);
        let credentials = CredentialManager::with_clock(
            transport.clone(),
            &RegistryConfig::default(),
            Arc::new(ManualClock::default()),
        );

        let err = register_instance(transport.as_ref(), &credentials, &test_instance())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::RegistrationFailure { status: 500 }
        ));
    }

    #[tokio::test]
    async fn missing_token_aborts_before_the_register_call() {
        let transport = Arc::new(ScriptedRegistry::default());
        transport.fail_logins.store(1, Ordering::SeqCst);
        let credentials = CredentialManager::with_clock(
            transport.clone(),
            &RegistryConfig::default(),
            Arc::new(ManualClock::default()),
        );

        let err = register_instance(transport.as_ref(), &credentials, &test_instance())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::AuthenticationFailure(_)));
        assert_eq!(transport.registers.load(Ordering::SeqCst), 0);
    }
}
